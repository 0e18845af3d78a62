//! # 请求转发规划
//!
//! 计算上游地址、重写后的 URI 以及需要修改的请求头，然后应用到 Pingora 的上游请求上

use axum::http::{HeaderMap, Uri};
use pingora_http::RequestHeader;

use super::upstream_url::{UpstreamAddress, parse_base_url};
use crate::auth::{CredentialScheme, ResolvedCredential};
use crate::error::{ProxyError, Result};

/// 对上游请求头的一次修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderEdit {
    Set { name: String, value: String },
    Remove { name: String },
}

/// 一次转发的完整计划
#[derive(Debug, Clone)]
pub struct UpstreamPlan {
    pub address: UpstreamAddress,
    /// 上游请求的 path + query
    pub uri: String,
    pub edits: Vec<HeaderEdit>,
}

impl UpstreamPlan {
    /// 预检请求：保留路径，丢弃查询串，只改写 Host
    pub fn preflight(preflight: &UpstreamAddress, uri: &Uri) -> Self {
        Self {
            address: preflight.clone(),
            uri: format!("{}{}", preflight.base_path, uri.path()),
            edits: vec![host_edit(preflight)],
        }
    }

    /// 已认证的请求：替换凭证头，移除携带代理密钥的其它凭证头，改写 Host
    pub fn forward(
        credential: &ResolvedCredential,
        schemes: &[CredentialScheme],
        headers: &HeaderMap,
        uri: &Uri,
    ) -> Result<Self> {
        let address = parse_base_url(&credential.key.base_url)?;

        let mut target = format!("{}{}", address.base_path, uri.path());
        if let Some(query) = uri.query() {
            target.push('?');
            target.push_str(query);
        }

        let upstream = credential.upstream_header();
        let mut edits = vec![HeaderEdit::Set {
            name: upstream.name,
            value: upstream.value,
        }];

        // 代理密钥不能随其它凭证头泄露到上游
        edits.extend(
            schemes
                .iter()
                .filter(|scheme| scheme.header_name() != credential.scheme.header_name())
                .filter(|scheme| {
                    scheme.extract(headers).as_deref() == Some(credential.proxy_key.as_str())
                })
                .map(|scheme| HeaderEdit::Remove {
                    name: scheme.header_name().to_string(),
                }),
        );
        edits.push(host_edit(&address));

        Ok(Self {
            address,
            uri: target,
            edits,
        })
    }

    /// 完整的上游 URL
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.address.tls { "https" } else { "http" };
        format!("{scheme}://{}{}", self.address.host_header, self.uri)
    }

    /// 应用到 Pingora 上游请求
    pub fn apply(&self, request: &mut RequestHeader) -> Result<()> {
        let uri: Uri = self.uri.parse().map_err(|e| {
            ProxyError::internal_with_source(format!("无效的上游 URI: {}", self.uri), e)
        })?;
        request.set_uri(uri);

        for edit in &self.edits {
            match edit {
                HeaderEdit::Set { name, value } => {
                    request.insert_header(name.clone(), value.as_str())?;
                }
                HeaderEdit::Remove { name } => {
                    request.remove_header(name.as_str());
                }
            }
        }
        Ok(())
    }
}

fn host_edit(address: &UpstreamAddress) -> HeaderEdit {
    HeaderEdit::Set {
        name: "host".to_string(),
        value: address.host_header.clone(),
    }
}
