//! # Entity 模块
//!
//! 包含密钥库与用量账本的 Sea-ORM 实体定义

pub mod api_keys;
pub mod monthly_usage;
pub mod providers;
pub mod users;

pub use api_keys::Entity as ApiKeys;
pub use monthly_usage::Entity as MonthlyUsage;
pub use providers::Entity as Providers;
pub use users::Entity as Users;
