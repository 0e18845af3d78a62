//! # 路由配置

use axum::Router;
use axum::routing::get;

use crate::management::handlers::{health, usage};
use crate::management::server::AppState;

/// 创建所有 API 路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/users/{user_id}/usage", get(usage::user_usage))
        .route("/api-keys/{api_key_id}/usage", get(usage::api_key_usage))
        .with_state(state)
}
