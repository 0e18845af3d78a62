//! # 管理服务器
//!
//! Axum HTTP 服务器，提供只读的用量查询接口

use axum::Router;
use axum::http::Method;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ManagementServerConfig;
use crate::error::{ProxyError, Result};
use crate::linfo;
use crate::logging::{LogComponent, LogStage};
use crate::store::UsageLedger;

/// 管理服务器应用状态
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub ledger: Arc<dyn UsageLedger>,
}

impl AppState {
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, ledger: Arc<dyn UsageLedger>) -> Self {
        Self { db, ledger }
    }
}

/// 管理服务器
pub struct ManagementServer {
    config: ManagementServerConfig,
    router: Router,
}

impl ManagementServer {
    #[must_use]
    pub fn new(config: ManagementServerConfig, state: AppState) -> Self {
        Self {
            config,
            router: Self::create_router(state),
        }
    }

    /// 创建路由器
    pub fn create_router(state: AppState) -> Router {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers(Any)
            .allow_origin(Any);

        Router::new()
            .nest("/api", super::routes::create_routes(state))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
    }

    /// 启动服务器
    pub async fn serve(self) -> Result<()> {
        let address = self.config.bind_address();
        let listener = TcpListener::bind(address.as_str()).await.map_err(|e| {
            ProxyError::server_start_with_source(format!("管理服务器无法监听 {address}"), e)
        })?;
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "management_listening",
            "管理服务器开始监听",
            address = address.as_str()
        );

        axum::serve(listener, self.router)
            .await
            .map_err(|e| ProxyError::network_with_source("管理服务器异常退出", e))
    }
}
