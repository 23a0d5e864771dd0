//! 测试辅助：本地 HTTP 桩服务与可编排的假传输层

use std::net::SocketAddr;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::core::error::{PortalError, Result, TransportKind};
use crate::core::model::ProbeResult;
use crate::interfaces::{ProbeRequest, Transport};

/// 接受一个连接，读完请求后写回 `response` 并关闭；返回收到的原始请求
pub async fn serve_once(response: &'static str) -> (SocketAddr, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        request
    });

    (addr, handle)
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}

/// 取一个当前无人监听的端口
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub fn page(status_code: u16, body: impl Into<String>) -> Result<ProbeResult> {
    Ok(ProbeResult::new(status_code, HeaderMap::new(), body))
}

pub fn fail(kind: TransportKind) -> Result<ProbeResult> {
    Err(PortalError::transport(kind, kind.to_string()))
}

/// 按请求回放脚本化响应的传输层，并记录所有请求
pub struct FakeTransport<F> {
    handler: F,
    calls: Mutex<Vec<ProbeRequest>>,
}

impl<F> FakeTransport<F>
where
    F: Fn(&ProbeRequest) -> Result<ProbeResult> + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ProbeRequest> {
        self.calls.lock().clone()
    }

    pub fn count(&self, host: &str) -> usize {
        self.calls.lock().iter().filter(|r| r.host == host).count()
    }
}

#[async_trait]
impl<F> Transport for FakeTransport<F>
where
    F: Fn(&ProbeRequest) -> Result<ProbeResult> + Send + Sync,
{
    async fn probe(&self, request: ProbeRequest) -> Result<ProbeResult> {
        let reply = (self.handler)(&request);
        self.calls.lock().push(request);
        reply
    }
}
