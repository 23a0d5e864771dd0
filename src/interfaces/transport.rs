use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderMap;
use url::Url;

use crate::core::constants::PROBE_TIMEOUT;
use crate::core::error::{PortalError, Result};
use crate::core::model::ProbeResult;

/// 单次明文 HTTP 请求的描述
#[derive(Clone)]
pub struct ProbeRequest {
    pub method: Method,
    pub host: String,
    pub port: u16,
    /// 路径与查询串，总以 `/` 开头
    pub path: String,
    pub headers: HeaderMap,
    /// `application/x-www-form-urlencoded` 请求体
    pub form: Option<String>,
    pub timeout: Duration,
}

impl ProbeRequest {
    pub fn get(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') { path } else { format!("/{}", path) };
        Self {
            method: Method::GET,
            host: host.into(),
            port,
            path,
            headers: HeaderMap::new(),
            form: None,
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn post_form(host: impl Into<String>, port: u16, path: impl Into<String>, form: String) -> Self {
        Self {
            method: Method::POST,
            form: Some(form),
            ..Self::get(host, port, path)
        }
    }

    /// 由 `http://` 地址构造 GET 请求
    pub fn from_url(raw: &str) -> Result<Self> {
        let url = Url::parse(raw)?;
        if url.scheme() != "http" {
            return Err(PortalError::UnsupportedUrl(format!("only plain http is supported: {}", raw)));
        }
        let host = url
            .host_str()
            .ok_or_else(|| PortalError::UnsupportedUrl(format!("missing host: {}", raw)))?;
        let port = url.port_or_known_default().unwrap_or(80);
        let path = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };
        Ok(Self::get(host, port, path))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }
}

// 表单里有口令，只输出长度
impl fmt::Debug for ProbeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeRequest")
            .field("method", &self.method)
            .field("url", &self.url())
            .field("headers", &self.headers)
            .field("form", &self.form.as_ref().map(|form| format!("<redacted {} bytes>", form.len())))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// 探测传输层接口 (HttpProbe)
///
/// - 每次调用独立建连、用完即关，不复用连接。
/// - 不跟随重定向，3xx 作为数据交给解析器。
/// - 连接失败、超时、重置统一以 `PortalError::Transport` 返回。
#[async_trait]
pub trait Transport: Send + Sync {
    async fn probe(&self, request: ProbeRequest) -> Result<ProbeResult>;
}
