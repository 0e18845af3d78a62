//! # 月度用量实体定义
//!
//! 按 (代理密钥, 年, 月) 聚合的 Token 用量账本

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 月度用量实体
///
/// `(api_key_id, year, month)` 上有唯一索引，累加通过单条 upsert 完成。
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "monthly_usage")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub api_key_id: i32,
    pub year: i32,
    pub month: i32,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::api_keys::Entity",
        from = "Column::ApiKeyId",
        to = "super::api_keys::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    ApiKey,
}

impl Related<super::api_keys::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApiKey.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
