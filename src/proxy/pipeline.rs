//! # 代理处理流水线
//!
//! 与传输层无关的请求处理：路由分派、凭证解析、转发计划。Pingora 服务只负责把
//! 结果落到连接上。

use axum::http::{HeaderMap, Method, StatusCode, Uri};
use std::sync::Arc;

use super::forwarder::UpstreamPlan;
use super::router::Route;
use super::upstream_url::{UpstreamAddress, parse_base_url};
use crate::auth::{CredentialResolver, CredentialScope};
use crate::config::AppConfig;
use crate::error::{ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::statistics::UsageRecorder;
use crate::store::{KeyStore, UsageLedger};
use crate::{ldebug, linfo, lwarn};

/// 未匹配路由时的响应体
pub const NOT_FOUND_BODY: &str = "404 Not Found";

/// 分派结果
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// 转发到上游
    Upstream {
        route: Route,
        plan: UpstreamPlan,
        /// 需要统计用量时为代理密钥 ID
        usage_key: Option<i32>,
    },
    /// 直接以纯文本响应
    Reject { status: StatusCode, body: String },
}

impl Dispatch {
    fn reject(status: StatusCode, body: impl Into<String>) -> Self {
        Self::Reject {
            status,
            body: body.into(),
        }
    }
}

/// 代理处理流水线
pub struct ProxyPipeline {
    resolver: CredentialResolver,
    preflight: UpstreamAddress,
    recorder: UsageRecorder,
}

impl ProxyPipeline {
    pub fn new(
        resolver: CredentialResolver,
        preflight_base_url: &str,
        recorder: UsageRecorder,
    ) -> Result<Self> {
        Ok(Self {
            resolver,
            preflight: parse_base_url(preflight_base_url)?,
            recorder,
        })
    }

    /// 按配置组装
    pub fn from_config(
        config: &AppConfig,
        key_store: Arc<dyn KeyStore>,
        ledger: Arc<dyn UsageLedger>,
    ) -> Result<Self> {
        Self::new(
            CredentialResolver::new(key_store)?,
            &config.preflight.upstream_base_url,
            UsageRecorder::new(ledger, config.usage.max_body_bytes),
        )
    }

    #[must_use]
    pub const fn recorder(&self) -> &UsageRecorder {
        &self.recorder
    }

    /// 决定一个请求如何处理
    pub async fn dispatch(
        &self,
        request_id: &str,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> Dispatch {
        let route = Route::classify(method, uri.path());
        ldebug!(
            request_id,
            LogStage::RequestStart,
            LogComponent::Proxy,
            "route_classified",
            "请求路由分类完成",
            method = method.as_str(),
            path = uri.path(),
            route = route.as_str()
        );

        let scope = match route {
            Route::NotFound => return Dispatch::reject(StatusCode::NOT_FOUND, NOT_FOUND_BODY),
            Route::Preflight => {
                return Dispatch::Upstream {
                    route,
                    plan: UpstreamPlan::preflight(&self.preflight, uri),
                    usage_key: None,
                };
            }
            Route::ListModels => CredentialScope::BearerOnly,
            Route::Forward => CredentialScope::AnyHeader,
        };

        match self.authorize(request_id, route, scope, uri, headers).await {
            Ok(dispatch) => dispatch,
            Err(err) => {
                let (status, code) = err.to_http_response_parts();
                if status.is_server_error() {
                    lwarn!(
                        request_id,
                        LogStage::Authentication,
                        LogComponent::Auth,
                        "resolve_failed",
                        &format!("凭证解析失败: {err}"),
                        code = code
                    );
                } else {
                    linfo!(
                        request_id,
                        LogStage::Authentication,
                        LogComponent::Auth,
                        "request_rejected",
                        &err.client_message(),
                        status = status.as_u16()
                    );
                }
                Dispatch::reject(status, err.client_message())
            }
        }
    }

    async fn authorize(
        &self,
        request_id: &str,
        route: Route,
        scope: CredentialScope,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> std::result::Result<Dispatch, ProxyError> {
        let credential = self.resolver.resolve(headers, scope).await?;
        let plan = UpstreamPlan::forward(&credential, self.resolver.schemes(), headers, uri)?;

        linfo!(
            request_id,
            LogStage::UpstreamRequest,
            LogComponent::Upstream,
            "upstream_planned",
            "上游转发计划完成",
            api_key_id = credential.key.api_key_id,
            credential_header = credential.scheme.header_name(),
            upstream = plan.address.addr.as_str()
        );

        Ok(Dispatch::Upstream {
            route,
            usage_key: route.records_usage().then_some(credential.key.api_key_id),
            plan,
        })
    }
}
