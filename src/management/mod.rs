//! # 管理模块
//!
//! 只读的管理端口：健康检查与月度用量查询

pub mod handlers;
pub mod response;
pub mod routes;
pub mod server;

pub use server::{AppState, ManagementServer};
