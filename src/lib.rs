//! # key-relay
//!
//! LLM API 密钥中继：用代理密钥换取真实的提供商凭证转发请求，
//! 并按自然月累计每个代理密钥的 Token 用量。

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod management;
pub mod proxy;
pub mod server_setup;
pub mod statistics;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{ProxyError, Result};
