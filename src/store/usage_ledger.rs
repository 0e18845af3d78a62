//! # 用量账本
//!
//! 按 (代理密钥, 年, 月) 累加输入/输出 Token

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, TimeZone};
use entity::monthly_usage;
use sea_orm::sea_query::{Expr, OnConflict, SimpleExpr};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Context, ProxyError, Result};

/// 一次请求（或一个统计周期）的 Token 数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    #[must_use]
    pub const fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0
    }

    /// 饱和相加
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self {
            input_tokens: self.input_tokens.saturating_add(other.input_tokens),
            output_tokens: self.output_tokens.saturating_add(other.output_tokens),
        }
    }
}

/// 用量桶（自然月）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageBucket {
    pub year: i32,
    pub month: u32,
}

impl UsageBucket {
    /// 构造用量桶，月份必须在 1..=12
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(ProxyError::validation(
                format!("月份超出范围: {month}"),
                Some("month"),
            ));
        }
        Ok(Self { year, month })
    }

    /// 给定时间点所在的用量桶
    #[must_use]
    pub fn from_datetime<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    /// 本地时区当前月份
    #[must_use]
    pub fn current() -> Self {
        Self::from_datetime(&Local::now())
    }

    fn month_i32(self) -> i32 {
        // 1..=12 在 i32 范围内
        i32::try_from(self.month).unwrap_or(i32::MAX)
    }
}

/// 用量账本
///
/// `increment` 必须是原子的"加或创建"：并发写同一个桶不能丢失更新。
#[async_trait]
pub trait UsageLedger: Send + Sync {
    async fn increment(&self, api_key_id: i32, bucket: UsageBucket, delta: TokenUsage)
    -> Result<()>;

    /// 读取一个桶，不存在时返回零值
    async fn get(&self, api_key_id: i32, bucket: UsageBucket) -> Result<TokenUsage>;
}

/// 基于数据库的用量账本
pub struct DbUsageLedger {
    db: Arc<DatabaseConnection>,
}

impl DbUsageLedger {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn to_db_count(value: u64, field: &str) -> Result<i64> {
    i64::try_from(value).map_err(|e| {
        ProxyError::internal_with_source(format!("{field} 超出数据库可表示范围: {value}"), e)
    })
}

fn from_db_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// `col + delta`，在 `i64::MAX` 处封顶；比较在加法之前完成，SQL 侧不会溢出
fn saturating_increment(column: monthly_usage::Column, delta: i64) -> SimpleExpr {
    let current = Expr::col((monthly_usage::Entity, column));
    Expr::case(current.clone().gt(i64::MAX - delta), i64::MAX)
        .finally(current.add(delta))
        .into()
}

#[async_trait]
impl UsageLedger for DbUsageLedger {
    async fn increment(
        &self,
        api_key_id: i32,
        bucket: UsageBucket,
        delta: TokenUsage,
    ) -> Result<()> {
        let input = to_db_count(delta.input_tokens, "input_tokens")?;
        let output = to_db_count(delta.output_tokens, "output_tokens")?;
        let now = Local::now().naive_local();

        let row = monthly_usage::ActiveModel {
            api_key_id: Set(api_key_id),
            year: Set(bucket.year),
            month: Set(bucket.month_i32()),
            input_tokens: Set(input),
            output_tokens: Set(output),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        // 单条 INSERT ... ON CONFLICT DO UPDATE，由唯一索引保证并发安全
        monthly_usage::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    monthly_usage::Column::ApiKeyId,
                    monthly_usage::Column::Year,
                    monthly_usage::Column::Month,
                ])
                .value(
                    monthly_usage::Column::InputTokens,
                    saturating_increment(monthly_usage::Column::InputTokens, input),
                )
                .value(
                    monthly_usage::Column::OutputTokens,
                    saturating_increment(monthly_usage::Column::OutputTokens, output),
                )
                .value(monthly_usage::Column::UpdatedAt, Expr::value(now))
                .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .context("更新月度用量失败")?;

        Ok(())
    }

    async fn get(&self, api_key_id: i32, bucket: UsageBucket) -> Result<TokenUsage> {
        let row = monthly_usage::Entity::find()
            .filter(monthly_usage::Column::ApiKeyId.eq(api_key_id))
            .filter(monthly_usage::Column::Year.eq(bucket.year))
            .filter(monthly_usage::Column::Month.eq(bucket.month_i32()))
            .one(self.db.as_ref())
            .await
            .context("查询月度用量失败")?;

        Ok(row.map_or_else(TokenUsage::default, |r| {
            TokenUsage::new(from_db_count(r.input_tokens), from_db_count(r.output_tokens))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::seed_active_key;
    use crate::testing::helpers::create_temp_db;
    use chrono::Utc;

    #[test]
    fn test_bucket_from_datetime() {
        let at = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(UsageBucket::from_datetime(&at), UsageBucket { year: 2024, month: 12 });
    }

    #[test]
    fn test_bucket_rejects_bad_month() {
        assert!(UsageBucket::new(2024, 0).is_err());
        assert!(UsageBucket::new(2024, 13).is_err());
        assert!(UsageBucket::new(2024, 7).is_ok());
    }

    #[test]
    fn test_token_usage_saturating_add() {
        let total = TokenUsage::new(u64::MAX, 1).saturating_add(TokenUsage::new(5, 2));
        assert_eq!(total, TokenUsage::new(u64::MAX, 3));
        assert!(TokenUsage::default().is_zero());
    }

    #[tokio::test]
    async fn test_increment_creates_then_adds() {
        let (db, _dir) = create_temp_db().await.unwrap();
        let key = seed_active_key(&db, "pk-ledger").await;
        let ledger = DbUsageLedger::new(Arc::new(db));
        let bucket = UsageBucket::new(2024, 6).unwrap();

        assert_eq!(ledger.get(key.id, bucket).await.unwrap(), TokenUsage::default());

        ledger.increment(key.id, bucket, TokenUsage::new(10, 5)).await.unwrap();
        ledger.increment(key.id, bucket, TokenUsage::new(7, 3)).await.unwrap();

        assert_eq!(ledger.get(key.id, bucket).await.unwrap(), TokenUsage::new(17, 8));
    }

    #[tokio::test]
    async fn test_buckets_are_independent() {
        let (db, _dir) = create_temp_db().await.unwrap();
        let key = seed_active_key(&db, "pk-months").await;
        let ledger = DbUsageLedger::new(Arc::new(db));
        let june = UsageBucket::new(2024, 6).unwrap();
        let july = UsageBucket::new(2024, 7).unwrap();

        ledger.increment(key.id, june, TokenUsage::new(1, 1)).await.unwrap();
        ledger.increment(key.id, july, TokenUsage::new(2, 0)).await.unwrap();

        assert_eq!(ledger.get(key.id, june).await.unwrap(), TokenUsage::new(1, 1));
        assert_eq!(ledger.get(key.id, july).await.unwrap(), TokenUsage::new(2, 0));
    }

    #[tokio::test]
    async fn test_oversized_delta_is_rejected() {
        let (db, _dir) = create_temp_db().await.unwrap();
        let key = seed_active_key(&db, "pk-huge").await;
        let ledger = DbUsageLedger::new(Arc::new(db));
        let bucket = UsageBucket::new(2024, 6).unwrap();

        let err = ledger
            .increment(key.id, bucket, TokenUsage::new(u64::MAX, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Internal { .. }));
        assert_eq!(ledger.get(key.id, bucket).await.unwrap(), TokenUsage::default());
    }

    #[tokio::test]
    async fn test_increment_saturates_at_storage_ceiling() {
        let (db, _dir) = create_temp_db().await.unwrap();
        let key = seed_active_key(&db, "pk-ceiling").await;
        let ledger = DbUsageLedger::new(Arc::new(db));
        let bucket = UsageBucket::new(2024, 6).unwrap();
        let near_max = (i64::MAX - 1) as u64;

        ledger.increment(key.id, bucket, TokenUsage::new(near_max, 1)).await.unwrap();
        ledger.increment(key.id, bucket, TokenUsage::new(near_max, 2)).await.unwrap();

        assert_eq!(
            ledger.get(key.id, bucket).await.unwrap(),
            TokenUsage::new(i64::MAX as u64, 3)
        );
    }
}
