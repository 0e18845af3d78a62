//! # 密钥库
//!
//! 代理密钥 -> 上游服务商凭证的只读查询

use async_trait::async_trait;
use entity::{api_keys, providers};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::fmt;
use std::sync::Arc;

use crate::error::{Context, Result};

/// 一次成功解析的结果
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    /// 代理密钥记录 ID，用量账本以此为键
    pub api_key_id: i32,
    /// 上游真实凭证
    pub upstream_api_key: String,
    /// 上游基础地址，例如 `https://api.openai.com`
    pub base_url: String,
}

impl fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("api_key_id", &self.api_key_id)
            .field("upstream_api_key", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// 密钥库
///
/// 只有代理密钥和其服务商同时处于启用状态时才返回结果。
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn find_active(&self, proxy_key: &str) -> Result<Option<ResolvedKey>>;
}

/// 基于数据库的密钥库
pub struct DbKeyStore {
    db: Arc<DatabaseConnection>,
}

impl DbKeyStore {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyStore for DbKeyStore {
    async fn find_active(&self, proxy_key: &str) -> Result<Option<ResolvedKey>> {
        let row = api_keys::Entity::find()
            .filter(api_keys::Column::ApiKey.eq(proxy_key))
            .filter(api_keys::Column::IsActive.eq(true))
            .find_also_related(providers::Entity)
            .filter(providers::Column::IsActive.eq(true))
            .one(self.db.as_ref())
            .await
            .context("查询代理密钥失败")?;

        Ok(match row {
            Some((key, Some(provider))) => Some(ResolvedKey {
                api_key_id: key.id,
                upstream_api_key: provider.api_key,
                base_url: provider.base_url,
            }),
            _ => None,
        })
    }
}
