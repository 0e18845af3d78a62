use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MonthlyUsage::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MonthlyUsage::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MonthlyUsage::ApiKeyId).integer().not_null())
                    .col(ColumnDef::new(MonthlyUsage::Year).integer().not_null())
                    .col(ColumnDef::new(MonthlyUsage::Month).integer().not_null())
                    .col(
                        ColumnDef::new(MonthlyUsage::InputTokens)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MonthlyUsage::OutputTokens)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MonthlyUsage::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MonthlyUsage::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_monthly_usage_api_key_id")
                            .from(MonthlyUsage::Table, MonthlyUsage::ApiKeyId)
                            .to(ApiKeys::Table, ApiKeys::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 用量桶唯一约束：upsert 的冲突目标
        manager
            .create_index(
                Index::create()
                    .name("idx_monthly_usage_bucket")
                    .table(MonthlyUsage::Table)
                    .col(MonthlyUsage::ApiKeyId)
                    .col(MonthlyUsage::Year)
                    .col(MonthlyUsage::Month)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MonthlyUsage::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MonthlyUsage {
    Table,
    Id,
    ApiKeyId,
    Year,
    Month,
    InputTokens,
    OutputTokens,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ApiKeys {
    Table,
    Id,
}
