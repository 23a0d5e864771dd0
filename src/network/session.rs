use tracing::{debug, info};

use crate::core::event::LogLevel;
use crate::core::model::AuthToken;
use crate::interfaces::ProbeRequest;
use crate::network::context::ServiceContext;

/// 会话预热 (SessionEstablisher)
///
/// 提交表单前先访问一次 `/fgtauth?<magic>`，让门户建立服务端会话。
/// 部分门户并不需要这一步，因此它没有错误类型：失败只返回 `false`。
pub struct SessionEstablisher<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> SessionEstablisher<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn visit(&self, token: &AuthToken) -> bool {
        let settings = &self.ctx.settings;
        let request = ProbeRequest::get(
            settings.gateway_host.clone(),
            settings.gateway_port,
            format!("/fgtauth?{}", token),
        )
        .with_timeout(settings.session_timeout);

        match self.ctx.probe(request).await {
            Ok(resp) => {
                debug!(status = resp.status_code, "Portal session primed");
                true
            }
            Err(e) => {
                info!("Session priming skipped: {}", e);
                self.ctx.log(LogLevel::Info, format!("Session priming skipped: {}", e));
                false
            }
        }
    }
}
