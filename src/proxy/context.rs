//! # 代理上下文
//!
//! 单个请求在 Pingora 各阶段之间传递的状态

use std::time::Instant;
use uuid::Uuid;

use super::forwarder::UpstreamPlan;
use super::router::Route;
use crate::statistics::BodyCollector;

/// 请求上下文
#[derive(Debug, Clone)]
pub struct ProxyContext {
    /// 请求ID
    pub request_id: String,
    /// 开始时间
    pub start_time: Instant,
    pub route: Option<Route>,
    /// 上游转发计划，请求被拒绝时为空
    pub plan: Option<UpstreamPlan>,
    /// 需要统计用量的代理密钥 ID
    pub usage_key: Option<i32>,
    pub response_status: Option<u16>,
    pub content_encoding: Option<String>,
    pub collector: Option<BodyCollector>,
}

impl ProxyContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            start_time: Instant::now(),
            route: None,
            plan: None,
            usage_key: None,
            response_status: None,
            content_encoding: None,
            collector: None,
        }
    }
}

impl Default for ProxyContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        let a = ProxyContext::new();
        let b = ProxyContext::default();
        assert_ne!(a.request_id, b.request_id);
        assert!(a.plan.is_none());
        assert!(a.collector.is_none());
    }
}
