//! 上游地址解析工具
//!
//! 统一处理 `base_url` 可能包含的 scheme / path / port，并输出可用于 Pingora 的 `host:port`。

use crate::config_error;
use crate::ensure;
use crate::error::Result;
use url::{Host, Url};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamAddress {
    /// Pingora 连接地址 `host:port`
    pub addr: String,
    /// 转发时使用的 Host 头
    pub host_header: String,
    pub sni: String,
    pub tls: bool,
    /// base_url 自带的路径前缀，不含结尾 `/`
    pub base_path: String,
}

/// 解析上游 `base_url`，输出 Peer 地址与 Host/SNI
pub fn parse_base_url(raw: &str) -> Result<UpstreamAddress> {
    let trimmed = raw.trim();
    ensure!(!trimmed.is_empty(), "base_url 不能为空");

    let url = if trimmed.contains("://") {
        Url::parse(trimmed)?
    } else {
        Url::parse(&format!("https://{trimmed}"))?
    };

    let tls = match url.scheme() {
        "https" => true,
        "http" => false,
        other => return Err(config_error!("base_url 协议不受支持: {other}")),
    };

    let host = url
        .host()
        .ok_or_else(|| config_error!("base_url 缺少 host: {trimmed}"))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| config_error!("base_url 缺少端口: {trimmed}"))?;

    let (host_display, sni) = match host {
        Host::Domain(domain) => (domain.to_string(), domain.to_string()),
        Host::Ipv4(ip) => (ip.to_string(), ip.to_string()),
        Host::Ipv6(ip) => (format!("[{ip}]"), ip.to_string()),
    };

    let addr = format!("{host_display}:{port}");
    let host_header = if url.port().is_some() {
        format!("{host_display}:{port}")
    } else {
        host_display
    };

    Ok(UpstreamAddress {
        addr,
        host_header,
        sni,
        tls,
        base_path: url.path().trim_end_matches('/').to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_https_port() {
        let addr = parse_base_url("https://api.openai.com").unwrap();
        assert_eq!(addr.addr, "api.openai.com:443");
        assert_eq!(addr.host_header, "api.openai.com");
        assert_eq!(addr.sni, "api.openai.com");
        assert!(addr.tls);
        assert_eq!(addr.base_path, "");
    }

    #[test]
    fn test_explicit_port_and_path() {
        let addr = parse_base_url("http://127.0.0.1:8000/openai/").unwrap();
        assert_eq!(addr.addr, "127.0.0.1:8000");
        assert_eq!(addr.host_header, "127.0.0.1:8000");
        assert!(!addr.tls);
        assert_eq!(addr.base_path, "/openai");
    }

    #[test]
    fn test_scheme_less_defaults_to_https() {
        let addr = parse_base_url("api.anthropic.com").unwrap();
        assert_eq!(addr.addr, "api.anthropic.com:443");
        assert!(addr.tls);
    }

    #[test]
    fn test_ipv6_host() {
        let addr = parse_base_url("http://[::1]:9000").unwrap();
        assert_eq!(addr.addr, "[::1]:9000");
        assert_eq!(addr.sni, "::1");
    }

    #[test]
    fn test_invalid_base_urls() {
        assert!(parse_base_url("  ").is_err());
        assert!(parse_base_url("ftp://files.example.com").is_err());
        assert!(parse_base_url("https://").is_err());
    }
}
