//! # 应用配置结构定义

use serde::{Deserialize, Serialize};

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 代理服务配置
    pub proxy: ProxyServerConfig,
    /// 管理服务配置
    pub management: ManagementServerConfig,
    /// 数据库配置
    pub database: super::DatabaseConfig,
    /// 预检请求上游
    pub preflight: PreflightConfig,
    /// 用量统计配置
    pub usage: UsageConfig,
}

/// 代理服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// Pingora 工作线程数，未设置时使用 CPU 核数
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

impl Default for ProxyServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

impl ProxyServerConfig {
    /// 监听地址 `host:port`
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 实际使用的工作线程数
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }
}

/// 管理服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagementServerConfig {
    /// 是否启用管理接口
    pub enabled: bool,
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

impl Default for ManagementServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 9090,
        }
    }
}

impl ManagementServerConfig {
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// OPTIONS 预检请求转发目标
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreflightConfig {
    pub upstream_base_url: String,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            upstream_base_url: "https://api.openai.com".to_string(),
        }
    }
}

/// 用量统计配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    /// 为统计而缓存的响应体上限（字节），超出后跳过统计
    pub max_body_bytes: usize,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}
