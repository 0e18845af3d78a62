//! # 凭证解析器
//!
//! 入站凭证 -> 上游基础地址 + 真实凭证，或拒绝。只读，无副作用。

use axum::http::HeaderMap;
use std::sync::Arc;

use super::header_parser::{AuthHeader, CREDENTIAL_HEADERS, CredentialScheme};
use crate::error::{AuthError, ProxyError, Result};
use crate::store::{KeyStore, ResolvedKey};

/// 接受哪些凭证头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialScope {
    /// 只接受表中第一行（`Authorization: Bearer`）
    BearerOnly,
    /// 按表的顺序依次尝试，第一个非空值生效
    AnyHeader,
}

/// 解析成功的凭证
#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    /// 调用方携带的代理密钥
    pub proxy_key: String,
    /// 携带代理密钥的那一行凭证头
    pub scheme: CredentialScheme,
    /// 密钥库查到的上游信息
    pub key: ResolvedKey,
}

impl ResolvedCredential {
    /// 发往上游的凭证头
    #[must_use]
    pub fn upstream_header(&self) -> AuthHeader {
        self.scheme.render(&self.key.upstream_api_key)
    }
}

/// 凭证解析器
pub struct CredentialResolver {
    key_store: Arc<dyn KeyStore>,
    schemes: Vec<CredentialScheme>,
}

impl CredentialResolver {
    /// 使用默认凭证头表
    pub fn new(key_store: Arc<dyn KeyStore>) -> Result<Self> {
        Self::with_templates(key_store, CREDENTIAL_HEADERS)
    }

    /// 使用自定义凭证头表
    pub fn with_templates(key_store: Arc<dyn KeyStore>, templates: &[&str]) -> Result<Self> {
        let schemes = CredentialScheme::parse_table(templates)
            .map_err(|e| ProxyError::config_with_source("凭证头模板无效", e))?;
        crate::ensure!(!schemes.is_empty(), "凭证头表不能为空");
        Ok(Self { key_store, schemes })
    }

    /// 全部凭证头，按优先级排列
    #[must_use]
    pub fn schemes(&self) -> &[CredentialScheme] {
        &self.schemes
    }

    fn schemes_in_scope(&self, scope: CredentialScope) -> &[CredentialScheme] {
        match scope {
            CredentialScope::BearerOnly => &self.schemes[..1],
            CredentialScope::AnyHeader => &self.schemes,
        }
    }

    /// 取出第一个非空的候选凭证
    #[must_use]
    pub fn extract(
        &self,
        headers: &HeaderMap,
        scope: CredentialScope,
    ) -> Option<(CredentialScheme, String)> {
        self.schemes_in_scope(scope)
            .iter()
            .find_map(|scheme| scheme.extract(headers).map(|key| (scheme.clone(), key)))
    }

    /// 解析入站凭证
    ///
    /// 没有任何候选值时返回 `ApiKeyMissing`；密钥或服务商未启用、或不存在时返回
    /// `ApiKeyNotFound`；密钥库故障原样上抛。
    pub async fn resolve(
        &self,
        headers: &HeaderMap,
        scope: CredentialScope,
    ) -> Result<ResolvedCredential> {
        let (scheme, proxy_key) = self
            .extract(headers, scope)
            .ok_or(AuthError::ApiKeyMissing)?;

        let key = self
            .key_store
            .find_active(&proxy_key)
            .await?
            .ok_or(AuthError::ApiKeyNotFound)?;

        Ok(ResolvedCredential {
            proxy_key,
            scheme,
            key,
        })
    }
}
