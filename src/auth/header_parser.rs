//! # 凭证头解析器
//!
//! 凭证头以 `"Header-Name: <prefix>{key}"` 模板描述。同一个模板既用于从入站请求中
//! 取出代理密钥，也用于渲染发往上游的真实凭证。

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::error::AuthParseError;

/// 代理接受的凭证头，按优先级排列
///
/// 新增一种服务商约定只需追加一行。`GET /v1/models` 只使用第一行。
pub const CREDENTIAL_HEADERS: &[&str] = &[
    "Authorization: Bearer {key}",
    "x-api-key: {key}",
    "x-google-api-key: {key}",
];

/// 解析后的认证头信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthHeader {
    /// HTTP头名称（小写格式）
    pub name: String,
    /// HTTP头值
    pub value: String,
}

impl AuthHeader {
    /// 创建新的认证头
    #[must_use]
    pub fn new(name: &str, value: String) -> Self {
        Self {
            name: name.to_lowercase(),
            value,
        }
    }
}

/// 通用认证头解析器
pub struct AuthHeaderParser;

impl AuthHeaderParser {
    /// 解析认证头格式并替换API密钥
    ///
    /// - `"Authorization: Bearer {key}"` -> `AuthHeader { name: "authorization", value: "Bearer sk-123" }`
    /// - `"x-api-key: {key}"` -> `AuthHeader { name: "x-api-key", value: "sk-456" }`
    pub fn parse(format: &str, api_key: &str) -> Result<AuthHeader, AuthParseError> {
        let (header_name, value_template) = Self::split_validated(format)?;
        Ok(AuthHeader::new(
            header_name,
            value_template.replace("{key}", api_key),
        ))
    }

    fn split_validated(format: &str) -> Result<(&str, &str), AuthParseError> {
        let (header_name, value_template) = format
            .split_once(": ")
            .ok_or_else(|| AuthParseError::InvalidFormat(format.to_string()))?;
        let header_name = header_name.trim();

        if header_name.is_empty() {
            return Err(AuthParseError::EmptyHeaderName(format.to_string()));
        }
        if value_template.trim().is_empty() {
            return Err(AuthParseError::EmptyHeaderValue(format.to_string()));
        }
        if !value_template.contains("{key}") {
            return Err(AuthParseError::MissingKeyPlaceholder(
                value_template.to_string(),
            ));
        }

        Ok((header_name, value_template))
    }
}

/// 一行凭证头配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialScheme {
    template: String,
    header_name: String,
    has_prefix: bool,
}

impl CredentialScheme {
    /// 从 `"Header-Name: <prefix>{key}"` 模板构造
    pub fn from_template(template: &str) -> Result<Self, AuthParseError> {
        let (header_name, value_template) = AuthHeaderParser::split_validated(template)?;
        Ok(Self {
            template: template.to_string(),
            header_name: header_name.to_lowercase(),
            has_prefix: !value_template.starts_with("{key}"),
        })
    }

    /// 解析整张表，保持顺序
    pub fn parse_table(templates: &[&str]) -> Result<Vec<Self>, AuthParseError> {
        templates.iter().map(|t| Self::from_template(t)).collect()
    }

    /// 小写的头名称
    #[must_use]
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// 从入站请求头中取出代理密钥
    ///
    /// 带前缀的模板（如 `Bearer {key}`）取空格分隔的第二段，否则取整个值。
    /// 空值视为没有携带。
    #[must_use]
    pub fn extract(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers.get(self.header_name.as_str())?.to_str().ok()?;
        let key = if self.has_prefix {
            value.split(' ').nth(1)?
        } else {
            value
        };
        (!key.is_empty()).then(|| key.to_string())
    }

    /// 渲染发往上游的凭证头
    #[must_use]
    pub fn render(&self, real_key: &str) -> AuthHeader {
        // 模板在构造时已校验
        AuthHeaderParser::parse(&self.template, real_key).unwrap_or_else(|_| {
            AuthHeader::new(&self.header_name, real_key.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_parse_authorization_bearer() {
        let result = AuthHeaderParser::parse("Authorization: Bearer {key}", "sk-test123").unwrap();
        assert_eq!(result.name, "authorization");
        assert_eq!(result.value, "Bearer sk-test123");
    }

    #[test]
    fn test_parse_raw_key_header() {
        let result = AuthHeaderParser::parse("x-google-api-key: {key}", "AIza_google_key").unwrap();
        assert_eq!(result.name, "x-google-api-key");
        assert_eq!(result.value, "AIza_google_key");
    }

    #[test]
    fn test_invalid_templates() {
        assert!(matches!(
            AuthHeaderParser::parse("Bearer {key}", "k"),
            Err(AuthParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            AuthHeaderParser::parse(": Bearer {key}", "k"),
            Err(AuthParseError::EmptyHeaderName(_))
        ));
        assert!(matches!(
            AuthHeaderParser::parse("Authorization: ", "k"),
            Err(AuthParseError::EmptyHeaderValue(_))
        ));
        assert!(matches!(
            AuthHeaderParser::parse("Authorization: Bearer token", "k"),
            Err(AuthParseError::MissingKeyPlaceholder(_))
        ));
    }

    #[test]
    fn test_default_table_parses_in_order() {
        let schemes = CredentialScheme::parse_table(CREDENTIAL_HEADERS).unwrap();
        let names: Vec<_> = schemes.iter().map(CredentialScheme::header_name).collect();
        assert_eq!(names, ["authorization", "x-api-key", "x-google-api-key"]);
    }

    #[test]
    fn test_bearer_extracts_second_token() {
        let scheme = CredentialScheme::from_template("Authorization: Bearer {key}").unwrap();

        assert_eq!(
            scheme.extract(&headers(&[("authorization", "Bearer pk-1")])),
            Some("pk-1".to_string())
        );
        assert_eq!(scheme.extract(&headers(&[("authorization", "pk-1")])), None);
        assert_eq!(scheme.extract(&headers(&[("authorization", "Bearer ")])), None);
        assert_eq!(scheme.extract(&headers(&[])), None);
    }

    #[test]
    fn test_raw_scheme_extracts_whole_value() {
        let scheme = CredentialScheme::from_template("x-api-key: {key}").unwrap();

        assert_eq!(
            scheme.extract(&headers(&[("x-api-key", "pk 2")])),
            Some("pk 2".to_string())
        );
        assert_eq!(scheme.extract(&headers(&[("x-api-key", "")])), None);
    }

    #[test]
    fn test_render_uses_template() {
        let bearer = CredentialScheme::from_template("Authorization: Bearer {key}").unwrap();
        let raw = CredentialScheme::from_template("x-api-key: {key}").unwrap();

        assert_eq!(bearer.render("sk-real").value, "Bearer sk-real");
        assert_eq!(raw.render("sk-real"), AuthHeader::new("x-api-key", "sk-real".to_string()));
    }
}
