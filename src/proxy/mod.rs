//! # 代理模块
//!
//! 基于 Pingora 的代理端口：路由、凭证替换、转发与用量旁路统计

pub mod context;
pub mod forwarder;
pub mod pipeline;
pub mod response;
pub mod router;
pub mod server;
pub mod service;
pub mod upstream_url;

pub use context::ProxyContext;
pub use forwarder::{HeaderEdit, UpstreamPlan};
pub use pipeline::{Dispatch, NOT_FOUND_BODY, ProxyPipeline};
pub use router::Route;
pub use server::ProxyServer;
pub use service::KeyRelayProxy;
pub use upstream_url::{UpstreamAddress, parse_base_url};
