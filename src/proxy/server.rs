//! # Pingora 代理服务器
//!
//! 创建 Pingora 服务器并在阻塞线程中运行

use pingora_core::server::{Server, configuration::Opt};
use pingora_proxy::http_proxy_service;
use std::sync::Arc;

use super::pipeline::ProxyPipeline;
use super::service::KeyRelayProxy;
use crate::config::ProxyServerConfig;
use crate::error::{ProxyError, Result};
use crate::linfo;
use crate::logging::{LogComponent, LogStage};

/// 代理服务器
pub struct ProxyServer {
    config: ProxyServerConfig,
    pipeline: Arc<ProxyPipeline>,
}

impl ProxyServer {
    #[must_use]
    pub const fn new(config: ProxyServerConfig, pipeline: Arc<ProxyPipeline>) -> Self {
        Self { config, pipeline }
    }

    fn create_pingora_options() -> Opt {
        Opt {
            daemon: false,
            upgrade: false,
            nocapture: true,
            ..Opt::default()
        }
    }

    /// 启动服务器，直到进程退出才返回
    pub async fn start(self) -> Result<()> {
        let mut server = Server::new(Some(Self::create_pingora_options()))
            .map_err(|e| ProxyError::server_start_with_source("创建 Pingora 服务器失败", e))?;
        server.bootstrap();

        let address = self.config.bind_address();
        let threads = self.config.worker_threads();
        let mut http_service =
            http_proxy_service(&server.configuration, KeyRelayProxy::new(self.pipeline));
        http_service.threads = Some(threads);
        http_service.add_tcp(&address);
        server.add_service(http_service);

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "proxy_listening",
            "代理服务器开始监听",
            address = address.as_str(),
            threads = threads
        );

        tokio::task::spawn_blocking(move || {
            server.run_forever();
        })
        .await
        .map_err(|e| ProxyError::server_start_with_source("Pingora 服务线程异常退出", e))
    }
}
