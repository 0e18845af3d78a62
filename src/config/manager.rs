//! # 配置管理器
//!
//! 加载 TOML 配置文件，应用环境变量覆盖并校验

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::AppConfig;
use crate::error::{ProxyError, Result};

/// 环境变量覆盖前缀，例如 `KEY_RELAY_PROXY_PORT` -> `proxy.port`
pub const ENV_PREFIX: &str = "KEY_RELAY_";

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "KEY_RELAY_CONFIG_PATH";

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<AppConfig>,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 按默认规则定位配置文件并加载
    ///
    /// 优先级：命令行路径 > `KEY_RELAY_CONFIG_PATH` > `config/config.{RUST_ENV}.toml`
    pub fn new(cli_path: Option<PathBuf>) -> Result<Self> {
        let config_file = Self::resolve_config_path(
            cli_path,
            env::var(CONFIG_PATH_ENV).ok(),
            env::var("RUST_ENV").ok(),
        );

        Self::from_file_with_overrides(&config_file, &Self::build_env_overrides())
    }

    /// 计算配置文件路径
    #[must_use]
    pub fn resolve_config_path(
        cli_path: Option<PathBuf>,
        env_path: Option<String>,
        rust_env: Option<String>,
    ) -> PathBuf {
        cli_path
            .or_else(|| env_path.map(PathBuf::from))
            .unwrap_or_else(|| {
                let env = rust_env.unwrap_or_else(|| "dev".to_string());
                PathBuf::from(format!("config/config.{env}.toml"))
            })
    }

    /// 从指定文件创建配置管理器，使用进程环境变量覆盖
    pub fn from_file(config_path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with_overrides(config_path.as_ref(), &Self::build_env_overrides())
    }

    /// 从指定文件和显式的覆盖表创建配置管理器
    pub fn from_file_with_overrides(
        config_path: &Path,
        overrides: &HashMap<String, String>,
    ) -> Result<Self> {
        let (mut config, source) = if config_path.exists() {
            (Self::load_config_file(config_path)?, Some(config_path.to_path_buf()))
        } else {
            warn!(
                "配置文件不存在: {}，使用内置默认配置",
                config_path.display()
            );
            (AppConfig::default(), None)
        };

        Self::apply_env_overrides(&mut config, overrides)?;
        super::validate_config(&config)?;

        info!(
            "配置加载完成 - 来源: {}, 环境变量覆盖: {} 个",
            source
                .as_ref()
                .map_or_else(|| "内置默认值".to_string(), |p| p.display().to_string()),
            overrides.len()
        );

        Ok(Self {
            config: Arc::new(config),
            source,
        })
    }

    /// 直接使用给定配置（测试和嵌入场景）
    pub fn from_config(config: AppConfig) -> Result<Self> {
        super::validate_config(&config)?;
        Ok(Self {
            config: Arc::new(config),
            source: None,
        })
    }

    /// 获取当前配置
    #[must_use]
    pub fn get_config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    /// 配置文件来源，使用默认值时为 `None`
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// 加载配置文件
    fn load_config_file(path: &Path) -> Result<AppConfig> {
        let config_content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config_with_source(format!("读取配置文件失败: {}", path.display()), e)
        })?;

        toml::from_str(&config_content).map_err(|e| {
            ProxyError::config_with_source(
                format!("TOML解析失败 - 配置文件: {}, 详细错误: {e}", path.display()),
                e,
            )
        })
    }

    /// 构建环境变量覆盖映射
    #[must_use]
    pub fn build_env_overrides() -> HashMap<String, String> {
        Self::collect_overrides(env::vars())
    }

    /// 从变量列表中筛选 `KEY_RELAY_` 前缀的覆盖项
    pub fn collect_overrides(
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> HashMap<String, String> {
        let overrides: HashMap<String, String> = vars
            .into_iter()
            .filter(|(key, _)| key != CONFIG_PATH_ENV)
            .filter_map(|(key, value)| {
                key.strip_prefix(ENV_PREFIX)
                    .map(|config_key| (config_key.to_lowercase().replace('_', "."), value))
            })
            .collect();

        debug!("发现 {} 个环境变量覆盖", overrides.len());
        overrides
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(
        config: &mut AppConfig,
        overrides: &HashMap<String, String>,
    ) -> Result<()> {
        for (path, value) in overrides {
            debug!(
                "应用环境变量覆盖: {} = {}",
                path,
                if path.starts_with("database.url") {
                    "***"
                } else {
                    value
                }
            );

            Self::apply_override_to_config(config, path, value)?;
        }
        Ok(())
    }

    /// 将环境变量覆盖应用到配置对象
    fn apply_override_to_config(config: &mut AppConfig, path: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = path.split('.').collect();

        match parts.as_slice() {
            ["proxy", "host"] => config.proxy.host = value.to_string(),
            ["proxy", "port"] => config.proxy.port = parse_value(path, value)?,
            ["proxy", "workers"] => config.proxy.workers = Some(parse_value(path, value)?),
            ["management", "enabled"] => config.management.enabled = parse_value(path, value)?,
            ["management", "host"] => config.management.host = value.to_string(),
            ["management", "port"] => config.management.port = parse_value(path, value)?,
            ["database", "url"] => config.database.url = value.to_string(),
            ["database", "max", "connections"] => {
                config.database.max_connections = parse_value(path, value)?;
            }
            ["database", "connect", "timeout"] => {
                config.database.connect_timeout = parse_value(path, value)?;
            }
            ["preflight", "upstream", "base", "url"] => {
                config.preflight.upstream_base_url = value.to_string();
            }
            ["usage", "max", "body", "bytes"] => {
                config.usage.max_body_bytes = parse_value(path, value)?;
            }
            _ => {
                warn!("未知的配置路径，忽略环境变量覆盖: {}", path);
            }
        }

        Ok(())
    }
}

fn parse_value<T>(path: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().map_err(|e| {
        ProxyError::config_with_source(format!("无效的配置值 {path}: {value}"), e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let manager = ConfigManager::from_file_with_overrides(
            Path::new("/nonexistent/key-relay.toml"),
            &HashMap::new(),
        )
        .unwrap();

        assert!(manager.source().is_none());
        assert_eq!(manager.get_config().proxy.port, 8080);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config(
            r#"
[proxy]
port = 18080

[preflight]
upstream_base_url = "http://127.0.0.1:9999"
"#,
        );

        let manager =
            ConfigManager::from_file_with_overrides(file.path(), &HashMap::new()).unwrap();
        let config = manager.get_config();

        assert_eq!(config.proxy.port, 18080);
        assert_eq!(config.proxy.host, "0.0.0.0");
        assert_eq!(config.preflight.upstream_base_url, "http://127.0.0.1:9999");
        assert_eq!(config.management.port, 9090);
        assert_eq!(manager.source(), Some(file.path()));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let file = write_config("proxy = = 1");
        let err =
            ConfigManager::from_file_with_overrides(file.path(), &HashMap::new()).unwrap_err();
        assert!(matches!(err, ProxyError::Config { .. }));
    }

    #[test]
    fn test_collect_overrides_maps_paths() {
        let overrides = ConfigManager::collect_overrides(vec![
            ("KEY_RELAY_PROXY_PORT".to_string(), "8181".to_string()),
            ("KEY_RELAY_CONFIG_PATH".to_string(), "/tmp/x.toml".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ]);

        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides.get("proxy.port").map(String::as_str), Some("8181"));
    }

    #[test]
    fn test_overrides_apply_and_validate() {
        let overrides = ConfigManager::collect_overrides(vec![
            ("KEY_RELAY_DATABASE_URL".to_string(), "sqlite::memory:".to_string()),
            ("KEY_RELAY_USAGE_MAX_BODY_BYTES".to_string(), "1024".to_string()),
            ("KEY_RELAY_MANAGEMENT_ENABLED".to_string(), "false".to_string()),
        ]);

        let manager =
            ConfigManager::from_file_with_overrides(Path::new("/nonexistent.toml"), &overrides)
                .unwrap();
        let config = manager.get_config();

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.usage.max_body_bytes, 1024);
        assert!(!config.management.enabled);
    }

    #[test]
    fn test_bad_override_value_is_rejected() {
        let mut config = AppConfig::default();
        let mut overrides = HashMap::new();
        overrides.insert("proxy.port".to_string(), "eighty".to_string());

        let err = ConfigManager::apply_env_overrides(&mut config, &overrides).unwrap_err();
        assert!(err.to_string().contains("proxy.port"));
    }

    #[test]
    fn test_config_path_precedence() {
        let cli = Some(PathBuf::from("/etc/key-relay/cli.toml"));
        let env_path = Some("/etc/key-relay/env.toml".to_string());

        assert_eq!(
            ConfigManager::resolve_config_path(cli, env_path.clone(), None),
            PathBuf::from("/etc/key-relay/cli.toml")
        );
        assert_eq!(
            ConfigManager::resolve_config_path(None, env_path, Some("prod".to_string())),
            PathBuf::from("/etc/key-relay/env.toml")
        );
        assert_eq!(
            ConfigManager::resolve_config_path(None, None, Some("prod".to_string())),
            PathBuf::from("config/config.prod.toml")
        );
        assert_eq!(
            ConfigManager::resolve_config_path(None, None, None),
            PathBuf::from("config/config.dev.toml")
        );
    }
}
