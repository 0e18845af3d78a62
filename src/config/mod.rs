//! # 配置管理模块
//!
//! 处理应用配置加载、验证和管理

mod app_config;
mod database;
mod manager;

pub use app_config::{
    AppConfig, ManagementServerConfig, PreflightConfig, ProxyServerConfig, UsageConfig,
};
pub use database::DatabaseConfig;
pub use manager::{CONFIG_PATH_ENV, ConfigManager, ENV_PREFIX};

use crate::ensure;
use crate::error::Result;

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<()> {
    ensure!(config.proxy.port != 0, "无效的代理端口: {}", config.proxy.port);
    ensure!(!config.proxy.host.is_empty(), "代理监听地址不能为空");
    if let Some(workers) = config.proxy.workers {
        ensure!(workers > 0, "工作线程数必须大于0");
    }

    if config.management.enabled {
        ensure!(
            config.management.port != 0,
            "无效的管理端口: {}",
            config.management.port
        );
        ensure!(
            !(config.management.port == config.proxy.port
                && config.management.host == config.proxy.host),
            "管理端口与代理端口冲突: {}",
            config.management.port
        );
    }

    ensure!(!config.database.url.is_empty(), "数据库URL不能为空");
    ensure!(
        config.database.max_connections > 0,
        "数据库最大连接数必须大于0"
    );

    let preflight = url::Url::parse(&config.preflight.upstream_base_url).map_err(|e| {
        crate::error::ProxyError::config_with_source(
            format!(
                "无效的预检上游地址: {}",
                config.preflight.upstream_base_url
            ),
            e,
        )
    })?;
    ensure!(
        preflight.host_str().is_some(),
        "预检上游地址缺少主机名: {}",
        config.preflight.upstream_base_url
    );

    ensure!(config.usage.max_body_bytes > 0, "用量统计的最大响应体必须大于0");

    Ok(())
}
