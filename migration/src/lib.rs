pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_users_table;
mod m20240601_000002_create_providers_table;
mod m20240601_000003_create_api_keys_table;
mod m20240601_000004_create_monthly_usage_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_users_table::Migration),
            Box::new(m20240601_000002_create_providers_table::Migration),
            Box::new(m20240601_000003_create_api_keys_table::Migration),
            Box::new(m20240601_000004_create_monthly_usage_table::Migration),
        ]
    }
}
