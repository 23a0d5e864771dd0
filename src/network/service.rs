use std::net::IpAddr;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use tracing::debug;

use crate::core::constants::PROBE_TIMEOUT;
use crate::core::error::{PortalError, Result};
use crate::core::model::ProbeResult;
use crate::interfaces::{ProbeRequest, Transport};
use crate::network::middleware::{ConnectionCloseMiddleware, TraceMiddleware};

const CLIENT_UA: &str = concat!("portal-login/", env!("CARGO_PKG_VERSION"));

/// 基于 reqwest 的探测实现
#[derive(Clone)]
pub struct HttpService {
    client: ClientWithMiddleware,
}

impl HttpService {
    /// `bind_address` 用于把流量强制绑定到面向门户的网卡
    pub fn new(bind_address: Option<IpAddr>) -> Result<Self> {
        let client = Self::try_build_internal_client(bind_address)?;
        Ok(Self { client })
    }

    /// 构建底层的 HTTP 客户端
    fn try_build_internal_client(bind_address: Option<IpAddr>) -> Result<ClientWithMiddleware> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_UA));

        let client = reqwest::Client::builder()
            .no_proxy()
            .local_address(bind_address)
            .default_headers(headers)
            .pool_max_idle_per_host(0) // 不保留空闲连接，每次请求重新建连
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| PortalError::Client(e.to_string()))?;

        Ok(ClientBuilder::new(client)
            .with(ConnectionCloseMiddleware)
            .with(TraceMiddleware)
            .build())
    }
}

#[async_trait]
impl Transport for HttpService {
    async fn probe(&self, request: ProbeRequest) -> Result<ProbeResult> {
        let url = request.url();
        debug!(method = %request.method, %url, timeout = ?request.timeout, "Probing");

        let mut rb = self
            .client
            .request(request.method, &url)
            .headers(request.headers)
            .timeout(request.timeout);

        if let Some(form) = request.form {
            rb = rb
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(form);
        }

        let resp = rb.send().await?;
        let status_code = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp.text().await?;

        Ok(ProbeResult::new(status_code, headers, body))
    }
}
