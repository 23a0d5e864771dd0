use std::time::Instant;

use reqwest::header::{CONNECTION, HeaderValue};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use tracing::{debug, warn};

/// 短连接中间件
/// 负责为每个请求声明 `Connection: close`，门户常在请求之间重置状态，连接不能复用
pub struct ConnectionCloseMiddleware;

#[async_trait::async_trait]
impl Middleware for ConnectionCloseMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        req.headers_mut()
            .insert(CONNECTION, HeaderValue::from_static("close"));
        next.run(req, extensions).await
    }
}

/// 请求追踪中间件
/// 记录方法、地址、状态码与耗时；请求体 (含口令) 不落日志
pub struct TraceMiddleware;

#[async_trait::async_trait]
impl Middleware for TraceMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let method = req.method().clone();
        let url = req.url().to_string();
        let started = Instant::now();

        let result = next.run(req, extensions).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(resp) => debug!(%method, %url, status = resp.status().as_u16(), elapsed_ms, "HTTP exchange"),
            Err(e) => warn!(%method, %url, elapsed_ms, error = %e, "HTTP exchange failed"),
        }

        result
    }
}
