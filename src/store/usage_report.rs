//! # 用量报表
//!
//! 某个用户名下全部代理密钥在指定月份的用量

use entity::{api_keys, monthly_usage, providers, users};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::collections::HashMap;

use super::usage_ledger::UsageBucket;
use crate::error::{Context, Result};

/// 单个代理密钥的月度用量
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyUsageSummary {
    pub api_key_id: i32,
    pub name: String,
    pub provider_name: Option<String>,
    pub is_active: bool,
    pub usage_in: i64,
    pub usage_out: i64,
}

/// 用户名下每个代理密钥的月度用量，用户不存在时返回 `None`
///
/// 停用的密钥也会列出，没有用量记录的密钥用量为 0。
pub async fn monthly_summary_for_user(
    db: &DatabaseConnection,
    user_id: i32,
    bucket: UsageBucket,
) -> Result<Option<Vec<KeyUsageSummary>>> {
    let user = users::Entity::find_by_id(user_id)
        .one(db)
        .await
        .context("查询用户失败")?;
    if user.is_none() {
        return Ok(None);
    }

    let keys = api_keys::Entity::find()
        .filter(api_keys::Column::UserId.eq(user_id))
        .find_also_related(providers::Entity)
        .order_by_asc(api_keys::Column::Id)
        .all(db)
        .await
        .context("查询用户代理密钥失败")?;

    let key_ids: Vec<i32> = keys.iter().map(|(key, _)| key.id).collect();
    let month = i32::try_from(bucket.month).unwrap_or_default();
    let usage: HashMap<i32, (i64, i64)> = monthly_usage::Entity::find()
        .filter(monthly_usage::Column::ApiKeyId.is_in(key_ids))
        .filter(monthly_usage::Column::Year.eq(bucket.year))
        .filter(monthly_usage::Column::Month.eq(month))
        .all(db)
        .await
        .context("查询月度用量失败")?
        .into_iter()
        .map(|row| (row.api_key_id, (row.input_tokens, row.output_tokens)))
        .collect();

    Ok(Some(
        keys.into_iter()
            .map(|(key, provider)| {
                let (usage_in, usage_out) = usage.get(&key.id).copied().unwrap_or((0, 0));
                KeyUsageSummary {
                    api_key_id: key.id,
                    name: key.name,
                    provider_name: provider.map(|p| p.name),
                    is_active: key.is_active,
                    usage_in,
                    usage_out,
                }
            })
            .collect(),
    ))
}

/// 代理密钥是否存在（不区分启用状态）
pub async fn api_key_exists(db: &DatabaseConnection, api_key_id: i32) -> Result<bool> {
    let key = api_keys::Entity::find_by_id(api_key_id)
        .one(db)
        .await
        .context("查询代理密钥失败")?;
    Ok(key.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DbUsageLedger, TokenUsage, UsageLedger};
    use crate::testing::fixtures::{seed_key, seed_provider, seed_user};
    use crate::testing::helpers::create_temp_db;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_summary_lists_every_key_with_month_usage() {
        let (db, _dir) = create_temp_db().await.unwrap();
        let db = Arc::new(db);
        let user = seed_user(&db, "carol@example.com").await;
        let other = seed_user(&db, "dave@example.com").await;
        let provider = seed_provider(&db, "openai", "sk", "https://api.openai.com", true).await;
        let used = seed_key(&db, user.id, provider.id, "pk-used", true).await;
        let idle = seed_key(&db, user.id, provider.id, "pk-idle", false).await;
        let foreign = seed_key(&db, other.id, provider.id, "pk-foreign", true).await;

        let ledger = DbUsageLedger::new(Arc::clone(&db));
        let june = UsageBucket::new(2024, 6).unwrap();
        let may = UsageBucket::new(2024, 5).unwrap();
        ledger.increment(used.id, june, TokenUsage::new(10, 5)).await.unwrap();
        ledger.increment(used.id, may, TokenUsage::new(100, 100)).await.unwrap();
        ledger.increment(foreign.id, june, TokenUsage::new(1, 1)).await.unwrap();

        let summary = monthly_summary_for_user(&db, user.id, june).await.unwrap().unwrap();

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].api_key_id, used.id);
        assert_eq!((summary[0].usage_in, summary[0].usage_out), (10, 5));
        assert_eq!(summary[0].provider_name.as_deref(), Some("openai"));
        assert_eq!(summary[1].api_key_id, idle.id);
        assert!(!summary[1].is_active);
        assert_eq!((summary[1].usage_in, summary[1].usage_out), (0, 0));
    }

    #[tokio::test]
    async fn test_unknown_user_is_none() {
        let (db, _dir) = create_temp_db().await.unwrap();
        let bucket = UsageBucket::new(2024, 6).unwrap();
        assert!(monthly_summary_for_user(&db, 404, bucket).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_api_key_exists_ignores_active_flag() {
        let (db, _dir) = create_temp_db().await.unwrap();
        let user = seed_user(&db, "erin@example.com").await;
        let provider = seed_provider(&db, "openai", "sk", "https://api.openai.com", true).await;
        let key = seed_key(&db, user.id, provider.id, "pk-off", false).await;

        assert!(api_key_exists(&db, key.id).await.unwrap());
        assert!(!api_key_exists(&db, key.id + 100).await.unwrap());
    }
}
