use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::error::{PortalError, Result};
use crate::core::event::LogLevel;
use crate::engine::retry::{RetryOutcome, RetryPolicy, retry};
use crate::interfaces::ProbeRequest;
use crate::network::context::ServiceContext;

/// 外网验证 (ConnectivityVerifier)
///
/// 登录后客户端或 AP 的 DNS/ARP 缓存需要片刻才能反映新状态，因此有界重试。
pub struct ConnectivityVerifier<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ConnectivityVerifier<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// 任一次判定为已连通即返回 `true`；仅在被取消时返回错误
    pub async fn verify(&self, max_attempts: u32, delay: Duration) -> Result<bool> {
        let policy = RetryPolicy::new(max_attempts, delay);

        let outcome = retry(policy, &self.ctx.shutdown, |attempt| async move {
            info!("Verifying internet, attempt {}/{}", attempt, policy.attempts);
            self.ctx.verify_attempt(attempt, policy.attempts);
            self.check_once().await
        })
        .await;

        match outcome {
            RetryOutcome::Satisfied { attempt } => {
                info!("Internet verified on attempt {}", attempt);
                Ok(true)
            }
            RetryOutcome::Exhausted => {
                warn!("Internet verification failed after {} attempts", policy.attempts);
                self.ctx.log(
                    LogLevel::Warn,
                    format!("Internet not reachable after {} attempts", policy.attempts),
                );
                Ok(false)
            }
            RetryOutcome::Cancelled => Err(PortalError::Cancelled),
        }
    }

    /// 单次验证探测，任何失败都记为未连通
    pub async fn check_once(&self) -> bool {
        let settings = &self.ctx.settings;
        let request = match ProbeRequest::from_url(&settings.probe_url) {
            Ok(r) => r.with_timeout(settings.verify_timeout),
            Err(e) => {
                warn!("Invalid probe URL: {}", e);
                return false;
            }
        };

        match self.ctx.probe(request).await {
            Ok(resp) => self.ctx.policy().classify(&resp.body, resp.status_code).is_connected(),
            Err(e) => {
                debug!("Verification probe failed: {}", e);
                false
            }
        }
    }
}
