//! # Pingora 代理服务
//!
//! 把 [`ProxyPipeline`] 的分派结果落到 Pingora 的各个阶段：
//! `request_filter` 决定拒绝还是转发，`upstream_request_filter` 替换凭证，
//! 响应体在 `response_body_filter` 中旁路收集，`logging` 阶段写入用量。

use async_trait::async_trait;
use bytes::Bytes;
use pingora_core::{Error, ErrorType, Result as PingoraResult, upstreams::peer::HttpPeer};
use pingora_http::{RequestHeader, ResponseHeader};
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;
use std::time::Duration;

use super::context::ProxyContext;
use super::pipeline::{Dispatch, ProxyPipeline};
use super::response::write_plain_response;
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lerror, linfo, lwarn};

/// 密钥中继代理服务
pub struct KeyRelayProxy {
    pipeline: Arc<ProxyPipeline>,
}

impl KeyRelayProxy {
    #[must_use]
    pub const fn new(pipeline: Arc<ProxyPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl ProxyHttp for KeyRelayProxy {
    type CTX = ProxyContext;

    fn new_ctx(&self) -> Self::CTX {
        ProxyContext::new()
    }

    async fn request_filter(
        &self,
        session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> PingoraResult<bool> {
        let req = session.req_header();
        let dispatch = self
            .pipeline
            .dispatch(&ctx.request_id, &req.method, &req.uri, &req.headers)
            .await;

        match dispatch {
            Dispatch::Upstream {
                route,
                plan,
                usage_key,
            } => {
                ctx.route = Some(route);
                ctx.plan = Some(plan);
                ctx.usage_key = usage_key;
                Ok(false)
            }
            Dispatch::Reject { status, body } => {
                write_plain_response(session, status, &body).await?;
                Ok(true)
            }
        }
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> PingoraResult<Box<HttpPeer>> {
        let Some(plan) = ctx.plan.as_ref() else {
            return Err(Error::explain(
                ErrorType::InternalError,
                "upstream plan missing",
            ));
        };
        let address = &plan.address;
        // 自行解析 DNS，解析失败按连接错误处理
        let socket_addr = tokio::net::lookup_host(address.addr.as_str())
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| {
                Error::explain(
                    ErrorType::ConnectError,
                    format!("failed to resolve upstream {}", address.addr),
                )
            })?;
        let peer = HttpPeer::new(socket_addr, address.tls, address.sni.clone());

        ldebug!(
            &ctx.request_id,
            LogStage::UpstreamRequest,
            LogComponent::Upstream,
            "peer_selected",
            "上游节点已选定",
            addr = address.addr.as_str(),
            tls = address.tls
        );
        Ok(Box::new(peer))
    }

    async fn upstream_request_filter(
        &self,
        _session: &mut Session,
        upstream_request: &mut RequestHeader,
        ctx: &mut Self::CTX,
    ) -> PingoraResult<()> {
        let Some(plan) = ctx.plan.as_ref() else {
            return Err(Error::explain(
                ErrorType::InternalError,
                "upstream plan missing",
            ));
        };
        plan.apply(upstream_request).map_err(|e| {
            lerror!(
                &ctx.request_id,
                LogStage::UpstreamRequest,
                LogComponent::Upstream,
                "rewrite_failed",
                &format!("上游请求改写失败: {e}")
            );
            Error::explain(ErrorType::InternalError, "failed to rewrite upstream request")
        })
    }

    async fn response_filter(
        &self,
        _session: &mut Session,
        upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> PingoraResult<()> {
        ctx.response_status = Some(upstream_response.status.as_u16());
        if ctx.usage_key.is_some() {
            ctx.content_encoding = upstream_response
                .headers
                .get("content-encoding")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            ctx.collector = Some(self.pipeline.recorder().collector());
        }
        Ok(())
    }

    fn response_body_filter(
        &self,
        _session: &mut Session,
        body: &mut Option<Bytes>,
        _end_of_stream: bool,
        ctx: &mut Self::CTX,
    ) -> PingoraResult<Option<Duration>> {
        if let (Some(collector), Some(chunk)) = (ctx.collector.as_mut(), body.as_ref()) {
            collector.push(chunk);
        }
        Ok(None)
    }

    async fn logging(&self, _session: &mut Session, e: Option<&Error>, ctx: &mut Self::CTX) {
        let duration_ms = u64::try_from(ctx.start_time.elapsed().as_millis()).unwrap_or(u64::MAX);
        let route = ctx.route.map_or("rejected", |r| r.as_str());

        if let Some(error) = e {
            lwarn!(
                &ctx.request_id,
                LogStage::ResponseFailure,
                LogComponent::Proxy,
                "request_failed",
                &format!("代理请求失败: {error}"),
                route = route,
                duration_ms = duration_ms
            );
            return;
        }

        linfo!(
            &ctx.request_id,
            LogStage::Response,
            LogComponent::Proxy,
            "request_completed",
            "代理请求完成",
            route = route,
            status = ctx.response_status.unwrap_or_default(),
            duration_ms = duration_ms
        );

        if let (Some(api_key_id), Some(collector)) = (ctx.usage_key, ctx.collector.as_ref()) {
            self.pipeline
                .recorder()
                .record(
                    &ctx.request_id,
                    api_key_id,
                    ctx.content_encoding.as_deref(),
                    collector,
                )
                .await;
        }
    }
}
