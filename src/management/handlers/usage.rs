//! 月度用量查询处理器

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::management::{response, server::AppState};
use crate::store::{KeyUsageSummary, UsageBucket, api_key_exists, monthly_summary_for_user};

/// 月份查询参数，缺省为本地时区当前月份
#[derive(Debug, Default, Deserialize)]
pub struct MonthQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl MonthQuery {
    pub fn bucket(&self) -> Result<UsageBucket> {
        let current = UsageBucket::current();
        UsageBucket::new(
            self.year.unwrap_or(current.year),
            self.month.unwrap_or(current.month),
        )
    }
}

/// 用户月度用量
#[derive(Debug, Serialize)]
pub struct UserUsageResponse {
    pub user_id: i32,
    pub year: i32,
    pub month: u32,
    pub keys: Vec<KeyUsageSummary>,
}

/// 单个代理密钥的月度用量
#[derive(Debug, Serialize)]
pub struct KeyUsageResponse {
    pub api_key_id: i32,
    pub year: i32,
    pub month: u32,
    pub usage_in: u64,
    pub usage_out: u64,
}

/// `GET /api/users/{user_id}/usage`
pub async fn user_usage(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Query(query): Query<MonthQuery>,
) -> Response {
    let bucket = match query.bucket() {
        Ok(bucket) => bucket,
        Err(e) => return response::app_error(e),
    };

    match monthly_summary_for_user(&state.db, user_id, bucket).await {
        Ok(Some(keys)) => response::success(UserUsageResponse {
            user_id,
            year: bucket.year,
            month: bucket.month,
            keys,
        }),
        Ok(None) => response::error(
            StatusCode::NOT_FOUND,
            "USER_NOT_FOUND",
            &format!("用户不存在: {user_id}"),
        ),
        Err(e) => response::app_error(e),
    }
}

/// `GET /api/api-keys/{api_key_id}/usage`
pub async fn api_key_usage(
    State(state): State<AppState>,
    Path(api_key_id): Path<i32>,
    Query(query): Query<MonthQuery>,
) -> Response {
    let bucket = match query.bucket() {
        Ok(bucket) => bucket,
        Err(e) => return response::app_error(e),
    };

    match api_key_exists(&state.db, api_key_id).await {
        Ok(true) => {}
        Ok(false) => {
            return response::error(
                StatusCode::NOT_FOUND,
                "API_KEY_NOT_FOUND",
                &format!("代理密钥不存在: {api_key_id}"),
            );
        }
        Err(e) => return response::app_error(e),
    }

    match state.ledger.get(api_key_id, bucket).await {
        Ok(usage) => response::success(KeyUsageResponse {
            api_key_id,
            year: bucket.year,
            month: bucket.month,
            usage_in: usage.input_tokens,
            usage_out: usage.output_tokens,
        }),
        Err(e) => response::app_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_query_defaults_to_current() {
        let bucket = MonthQuery::default().bucket().unwrap();
        assert_eq!(bucket, UsageBucket::current());
    }

    #[test]
    fn test_month_query_validates_month() {
        let query = MonthQuery {
            year: Some(2024),
            month: Some(13),
        };
        assert!(query.bucket().is_err());

        let query = MonthQuery {
            year: Some(2023),
            month: Some(2),
        };
        assert_eq!(query.bucket().unwrap(), UsageBucket::new(2023, 2).unwrap());
    }
}
