//! # 认证模块
//!
//! 代理密钥的提取与解析：凭证头表、模板渲染以及基于密钥库的解析器

pub mod header_parser;
pub mod resolver;

pub use header_parser::{AuthHeader, AuthHeaderParser, CREDENTIAL_HEADERS, CredentialScheme};
pub use resolver::{CredentialResolver, CredentialScope, ResolvedCredential};
