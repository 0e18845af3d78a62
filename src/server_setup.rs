//! # 服务装配
//!
//! 连接数据库、组装存储与流水线，并让代理端口和管理端口并行运行，
//! 直到 Ctrl+C 或任一服务器退出。

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::database::{init_database, run_migrations};
use crate::error::{Context, Result};
use crate::logging::{LogComponent, LogStage};
use crate::management::{AppState, ManagementServer};
use crate::proxy::{ProxyPipeline, ProxyServer};
use crate::store::{DbKeyStore, DbUsageLedger, KeyStore, UsageLedger};
use crate::{lerror, linfo};

/// 运行期共享的服务
pub struct SharedServices {
    pub db: Arc<DatabaseConnection>,
    pub key_store: Arc<dyn KeyStore>,
    pub ledger: Arc<dyn UsageLedger>,
}

impl SharedServices {
    /// 基于已有连接组装存储
    #[must_use]
    pub fn from_connection(db: Arc<DatabaseConnection>) -> Self {
        Self {
            key_store: Arc::new(DbKeyStore::new(Arc::clone(&db))),
            ledger: Arc::new(DbUsageLedger::new(Arc::clone(&db))),
            db,
        }
    }
}

/// 连接数据库并执行迁移
pub async fn initialize_services(config: &AppConfig) -> Result<SharedServices> {
    let db = init_database(&config.database).await?;
    run_migrations(&db).await.context("数据库迁移失败")?;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Database,
        "database_ready",
        "数据库已就绪"
    );
    Ok(SharedServices::from_connection(Arc::new(db)))
}

/// 创建服务器实例，管理端口关闭时只返回代理服务器
pub fn create_servers(
    config: &AppConfig,
    services: &SharedServices,
) -> Result<(Option<ManagementServer>, ProxyServer)> {
    let pipeline = ProxyPipeline::from_config(
        config,
        Arc::clone(&services.key_store),
        Arc::clone(&services.ledger),
    )
    .context("代理流水线初始化失败")?;
    let proxy_server = ProxyServer::new(config.proxy.clone(), Arc::new(pipeline));

    let management_server = config.management.enabled.then(|| {
        ManagementServer::new(
            config.management.clone(),
            AppState::new(Arc::clone(&services.db), Arc::clone(&services.ledger)),
        )
    });

    Ok((management_server, proxy_server))
}

async fn handle_ctrl_c_signal() -> String {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "Ctrl+C signal".to_string(),
        Err(e) => {
            lerror!(
                "system",
                LogStage::Shutdown,
                LogComponent::ServerSetup,
                "ctrl_c_error",
                &format!("监听 Ctrl+C 失败: {e:?}")
            );
            "Ctrl+C handler error".to_string()
        }
    }
}

/// 描述服务器任务退出的原因
fn handle_task_result(
    server_name: &str,
    result: std::result::Result<Result<()>, tokio::task::JoinError>,
) -> String {
    match result {
        Ok(Ok(())) => format!("{server_name} exit"),
        Ok(Err(e)) => {
            lerror!(
                "system",
                LogStage::Shutdown,
                LogComponent::ServerSetup,
                "server_error",
                &format!("{server_name} error: {e:?}")
            );
            format!("{server_name} error")
        }
        Err(e) => {
            lerror!(
                "system",
                LogStage::Shutdown,
                LogComponent::ServerSetup,
                "server_panic",
                &format!("{server_name} panicked: {e:?}")
            );
            format!("{server_name} panic")
        }
    }
}

/// 运行代理服务器与管理服务器
pub async fn run_servers(config: Arc<AppConfig>) -> Result<()> {
    let services = initialize_services(&config).await?;
    let (management_server, proxy_server) = create_servers(&config, &services)?;

    let mut management_task: JoinHandle<Result<()>> = match management_server {
        Some(server) => tokio::spawn(server.serve()),
        None => tokio::spawn(std::future::pending()),
    };
    let mut proxy_task: JoinHandle<Result<()>> = tokio::spawn(proxy_server.start());

    let shutdown_reason = tokio::select! {
        reason = handle_ctrl_c_signal() => reason,
        result = &mut management_task => handle_task_result("Management server", result),
        result = &mut proxy_task => handle_task_result("Proxy server", result),
    };

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::ServerSetup,
        "shutdown_initiated",
        &format!("停止服务: {shutdown_reason}")
    );
    management_task.abort();
    proxy_task.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::helpers::create_temp_db;

    #[tokio::test]
    async fn test_management_can_be_disabled() {
        let (db, _dir) = create_temp_db().await.unwrap();
        let services = SharedServices::from_connection(Arc::new(db));
        let mut config = AppConfig::default();

        let (management, _) = create_servers(&config, &services).unwrap();
        assert!(management.is_some());

        config.management.enabled = false;
        let (management, _) = create_servers(&config, &services).unwrap();
        assert!(management.is_none());
    }

    #[tokio::test]
    async fn test_bad_preflight_url_fails_setup() {
        let (db, _dir) = create_temp_db().await.unwrap();
        let services = SharedServices::from_connection(Arc::new(db));
        let mut config = AppConfig::default();
        config.preflight.upstream_base_url = "ftp://example.com".to_string();

        assert!(create_servers(&config, &services).is_err());
    }

    #[test]
    fn test_task_result_reason() {
        assert_eq!(handle_task_result("Proxy server", Ok(Ok(()))), "Proxy server exit");
        assert_eq!(
            handle_task_result(
                "Proxy server",
                Ok(Err(crate::error::ProxyError::internal("boom")))
            ),
            "Proxy server error"
        );
    }
}
