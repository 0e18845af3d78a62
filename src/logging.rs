//! # 日志配置模块
//!
//! 统一的结构化日志：初始化 `tracing` 订阅者，并提供带请求ID、阶段、组件字段的日志宏

use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 请求处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    Startup,
    Shutdown,
    Configuration,
    RequestStart,
    Authentication,
    UpstreamRequest,
    Response,
    ResponseFailure,
    Statistics,
    Db,
    Internal,
}

impl LogStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Configuration => "configuration",
            Self::RequestStart => "request_start",
            Self::Authentication => "authentication",
            Self::UpstreamRequest => "upstream_request",
            Self::Response => "response",
            Self::ResponseFailure => "response_failure",
            Self::Statistics => "statistics",
            Self::Db => "db",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    Main,
    ServerSetup,
    Config,
    Database,
    Proxy,
    Auth,
    Upstream,
    Statistics,
    UsageLedger,
    Management,
}

impl LogComponent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::ServerSetup => "server_setup",
            Self::Config => "config",
            Self::Database => "database",
            Self::Proxy => "proxy",
            Self::Auth => "auth",
            Self::Upstream => "upstream",
            Self::Statistics => "statistics",
            Self::UsageLedger => "usage_ledger",
            Self::Management => "management",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化 info 日志
///
/// ```ignore
/// linfo!(&ctx.request_id, LogStage::UpstreamRequest, LogComponent::Upstream,
///        "peer_selected", "上游节点选择完成", upstream = addr);
/// ```
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(, $($key:ident = $value:expr),* $(,)?)?) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($key = $value,)*)?
            "{}", $description
        )
    };
}

/// 结构化 debug 日志
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(, $($key:ident = $value:expr),* $(,)?)?) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($key = $value,)*)?
            "{}", $description
        )
    };
}

/// 结构化 warn 日志
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(, $($key:ident = $value:expr),* $(,)?)?) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($key = $value,)*)?
            "{}", $description
        )
    };
}

/// 结构化 error 日志
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(, $($key:ident = $value:expr),* $(,)?)?) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($key = $value,)*)?
            "{}", $description
        )
    };
}

/// 默认过滤规则：关闭 SQL 语句日志，降低 Pingora 内部噪声
#[must_use]
pub fn default_filter(level: &str) -> String {
    format!("{level},key_relay=debug,sqlx::query=off,sea_orm::query=warn,pingora_core=warn")
}

/// 初始化优化的日志系统
pub fn init_optimized_logging(log_level: Option<&String>) {
    let level = log_level.map_or("info", String::as_str);
    let log_filter = env::var("RUST_LOG").unwrap_or_else(|_| default_filter(level));

    let result = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into()))
        .with(
            tracing_fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();

    // 测试中可能重复初始化
    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
        return;
    }

    if env::var("RUST_LOG").is_ok_and(|v| {
        v.contains("sqlx::query=info") || v.contains("sqlx::query=debug")
    }) {
        tracing::info!("🔍 SQLx database query logging enabled");
    } else {
        tracing::info!("📋 SQLx database query logging disabled");
    }
}

/// 环境变量设置指南
pub fn print_logging_help() {
    println!("📋 日志配置指南:");
    println!("  RUST_LOG=info                      # 标准日志级别");
    println!("  RUST_LOG=debug                     # 调试级别");
    println!("  RUST_LOG=info,sqlx::query=info     # 启用数据库查询日志");
    println!("  RUST_LOG=key_relay=trace           # 应用详细追踪");
    println!("  RUST_LOG=info,pingora_core=info    # 显示 Pingora 连接日志");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_and_component_display() {
        assert_eq!(LogStage::UpstreamRequest.to_string(), "upstream_request");
        assert_eq!(LogComponent::UsageLedger.to_string(), "usage_ledger");
    }

    #[test]
    fn test_default_filter_silences_sql() {
        let filter = default_filter("warn");
        assert!(filter.starts_with("warn,"));
        assert!(filter.contains("sqlx::query=off"));
    }

    #[test]
    fn test_macros_accept_fields() {
        let request_id = "req-1".to_string();
        crate::linfo!(
            &request_id,
            LogStage::Statistics,
            LogComponent::Statistics,
            "usage_recorded",
            "记录用量",
            input_tokens = 10_u64,
            output_tokens = 5_u64,
        );
        crate::lwarn!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "no_fields",
            &format!("{} {}", "a", "b")
        );
    }
}
