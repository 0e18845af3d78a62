//! 健康检查处理器

use axum::extract::State;
use axum::response::Response;
use sea_orm::ConnectionTrait;
use serde::Serialize;

use crate::management::{response, server::AppState};

/// 健康状态
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

/// `GET /api/health`
pub async fn health_check(State(state): State<AppState>) -> Response {
    let database = match state.db.execute_unprepared("SELECT 1").await {
        Ok(_) => "ok",
        Err(_) => "unavailable",
    };
    response::success(HealthStatus {
        status: "ok",
        database,
        version: env!("CARGO_PKG_VERSION"),
    })
}
