//! 登录编排器 (AuthOrchestrator)
//!
//! 状态机：Idle -> FetchingChallenge -> (AlreadyConnected | ExtractingToken)
//! -> (TokenMissing | EstablishingSession) -> Posting -> Verifying -> Done
//!
//! 每次调用都从探测开始，互不共享状态；除外网验证外不做任何内部重试。

use std::future::Future;

use tracing::{debug, info, warn};

use crate::core::error::Result;
use crate::core::event::AuthStage;
use crate::core::model::{AuthToken, Credentials, LoginOutcome, ProbeResult};
use crate::interfaces::ProbeRequest;
use crate::network::context::ServiceContext;
use crate::network::login::LoginSubmitter;
use crate::network::session::SessionEstablisher;
use crate::network::verify::ConnectivityVerifier;
use crate::portal::parser::{contains_success_keyword, is_accepted, is_redirect};
use crate::portal::token::{extract_token, extract_token_with_pattern};
use crate::utils::preview;

/// 根据登录响应决定终态
///
/// 结果只取决于状态码、响应体与 `verify` 的返回值。
/// 状态码不被接受时不会调用 `verify`。
pub async fn determine_login_result<F, Fut>(status_code: u16, body: &str, verify: F) -> Result<LoginOutcome>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    if !is_accepted(status_code) {
        return Ok(LoginOutcome::Failed { status: status_code });
    }

    // 200 且无关键字只是“不确定”，仍进入验证
    let acknowledged = is_redirect(status_code) || contains_success_keyword(body);

    if verify().await? {
        Ok(LoginOutcome::Success)
    } else {
        Ok(LoginOutcome::SuccessUnconfirmed { acknowledged })
    }
}

/// 从探测响应中取 magic：先查响应体，再查 `Location` 头
pub fn find_token(challenge: &ProbeResult) -> Option<AuthToken> {
    if let Some((pattern, token)) = extract_token_with_pattern(&challenge.body) {
        debug!(pattern = %pattern, "Token extracted from body");
        return Some(token);
    }

    let token = challenge.location().and_then(extract_token)?;
    debug!("Token extracted from Location header");
    Some(token)
}

/// 登录编排器
pub struct AuthOrchestrator {
    ctx: ServiceContext,
}

impl AuthOrchestrator {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// 执行一次完整登录，恰好产生一个终态
    pub async fn run(&self, credentials: &Credentials) -> LoginOutcome {
        self.ctx.stage(AuthStage::Idle);

        let outcome = match self.attempt(credentials).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Login attempt aborted: {}", e);
                LoginOutcome::from(e)
            }
        };

        self.ctx.stage(AuthStage::Done);
        self.ctx.finished(&outcome);
        info!(outcome = %outcome, "{}", outcome.message());

        outcome
    }

    async fn attempt(&self, credentials: &Credentials) -> Result<LoginOutcome> {
        let settings = &self.ctx.settings;

        // 1. 拉取挑战页
        self.ctx.stage(AuthStage::FetchingChallenge);
        let request = ProbeRequest::from_url(&settings.probe_url)?.with_timeout(settings.probe_timeout);
        let challenge = self.ctx.probe(request).await?;

        // 2. 判定是否已连通
        let verdict = self.ctx.policy().classify(&challenge.body, challenge.status_code);
        debug!(
            status = challenge.status_code,
            len = challenge.body.len(),
            verdict = %verdict,
            body = %preview(&challenge.body, 200),
            "Challenge probed"
        );
        if verdict.is_connected() {
            self.ctx.stage(AuthStage::AlreadyConnected);
            return Ok(LoginOutcome::AlreadyConnected);
        }

        // 3. 提取 magic
        self.ctx.stage(AuthStage::ExtractingToken);
        let Some(token) = find_token(&challenge) else {
            self.ctx.stage(AuthStage::TokenMissing);
            return Ok(LoginOutcome::AuthParamsUnavailable);
        };

        // 4. 会话预热，失败不影响后续
        self.ctx.stage(AuthStage::EstablishingSession);
        SessionEstablisher::new(&self.ctx).visit(&token).await;
        self.ctx.sleep(settings.pre_post_delay).await?;

        // 5. 提交表单
        self.ctx.stage(AuthStage::Posting);
        let resp = LoginSubmitter::new(&self.ctx)
            .submit(credentials, &token, &settings.redirect_target)
            .await?;

        // 6/7. 判定并验证
        determine_login_result(resp.status_code, &resp.body, || async {
            self.ctx.stage(AuthStage::Verifying);
            ConnectivityVerifier::new(&self.ctx)
                .verify(settings.verify_attempts, settings.verify_delay)
                .await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use reqwest::Method;
    use reqwest::header::{HeaderMap, HeaderValue, LOCATION};

    use super::*;
    use crate::core::config::AuthSettings;
    use crate::core::error::{PortalError, TransportKind};
    use crate::core::event::{PortalEvent, create_event_channel};
    use crate::network::testing::{FakeTransport, fail, page};
    use crate::portal::detect::fixtures::{portal_page, search_page};

    const PROBE_HOST: &str = "www.google.com";
    const GATEWAY: &str = "172.16.62.1";

    fn fast_settings() -> Arc<AuthSettings> {
        Arc::new(AuthSettings {
            pre_post_delay: Duration::from_millis(1),
            verify_delay: Duration::from_millis(1),
            ..AuthSettings::default()
        })
    }

    fn creds() -> Credentials {
        Credentials::new("C110152000", "secret")
    }

    fn is_post(req: &ProbeRequest) -> bool {
        req.method == Method::POST
    }

    #[tokio::test]
    async fn test_already_connected_issues_no_post() {
        let fake = Arc::new(FakeTransport::new(|_| page(200, search_page())));
        let ctx = ServiceContext::new(fake.clone(), fast_settings());

        let outcome = AuthOrchestrator::new(ctx).run(&creds()).await;

        assert_eq!(outcome, LoginOutcome::AlreadyConnected);
        assert_eq!(fake.calls().len(), 1);
        assert_eq!(fake.count(GATEWAY), 0);
    }

    #[tokio::test]
    async fn test_missing_token() {
        let fake = Arc::new(FakeTransport::new(|_| page(200, "<html>fortinet maintenance</html>")));
        let ctx = ServiceContext::new(fake.clone(), fast_settings());

        let outcome = AuthOrchestrator::new(ctx).run(&creds()).await;

        assert_eq!(outcome, LoginOutcome::AuthParamsUnavailable);
        assert_eq!(fake.count(GATEWAY), 0);
    }

    #[tokio::test]
    async fn test_challenge_transport_error() {
        let fake = Arc::new(FakeTransport::new(|_| fail(TransportKind::Unreachable)));
        let ctx = ServiceContext::new(fake, fast_settings());

        let outcome = AuthOrchestrator::new(ctx).run(&creds()).await;
        assert_eq!(outcome, LoginOutcome::TransportError { kind: TransportKind::Unreachable });
    }

    #[tokio::test]
    async fn test_redirect_then_unverified_is_unconfirmed() {
        let fake = Arc::new(FakeTransport::new(|req| {
            if is_post(req) {
                page(302, "")
            } else {
                page(200, portal_page("1a2b3c4d"))
            }
        }));
        let ctx = ServiceContext::new(fake.clone(), fast_settings());

        let outcome = AuthOrchestrator::new(ctx).run(&creds()).await;

        assert_eq!(outcome, LoginOutcome::SuccessUnconfirmed { acknowledged: true });
        // 1 次挑战 + 3 次验证
        assert_eq!(fake.count(PROBE_HOST), 4);

        let calls = fake.calls();
        assert_eq!(calls[1].url(), "http://172.16.62.1:1000/fgtauth?1a2b3c4d");
        assert!(is_post(&calls[2]));
        assert!(calls[2].form.as_deref().unwrap().contains("magic=1a2b3c4d"));
    }

    #[tokio::test]
    async fn test_failed_session_still_posts() {
        let fake = Arc::new(FakeTransport::new(|req| {
            if is_post(req) {
                page(302, "")
            } else if req.host == GATEWAY {
                fail(TransportKind::Refused)
            } else {
                page(200, portal_page("c0ffee"))
            }
        }));
        let ctx = ServiceContext::new(fake.clone(), fast_settings());

        let outcome = AuthOrchestrator::new(ctx).run(&creds()).await;

        assert_eq!(outcome, LoginOutcome::SuccessUnconfirmed { acknowledged: true });
        let calls = fake.calls();
        // 挑战 + 预热 + 提交 + 3 次验证
        assert_eq!(calls.len(), 6);
        assert_eq!(calls[0].timeout, Duration::from_secs(10));
        assert_eq!(calls[1].url(), "http://172.16.62.1:1000/fgtauth?c0ffee");
        assert!(!is_post(&calls[1]));
        assert!(is_post(&calls[2]));
        assert_eq!(calls[2].url(), "http://172.16.62.1:1000/");
        assert_eq!(calls[2].timeout, Duration::from_secs(10));
        assert!(calls[2].form.as_deref().unwrap().contains("magic=c0ffee"));
        assert!(calls[3..].iter().all(|c| c.host == PROBE_HOST));
    }

    #[tokio::test]
    async fn test_refused_post_is_transport_error() {
        let fake = Arc::new(FakeTransport::new(|req| {
            if is_post(req) {
                fail(TransportKind::Refused)
            } else {
                page(200, portal_page("abcd"))
            }
        }));
        let ctx = ServiceContext::new(fake, fast_settings());

        let outcome = AuthOrchestrator::new(ctx).run(&creds()).await;

        assert_eq!(outcome, LoginOutcome::TransportError { kind: TransportKind::Refused });
        assert!(outcome.message().contains("server refused connection"));
    }

    #[tokio::test]
    async fn test_success_after_verification() {
        let posted = Arc::new(AtomicBool::new(false));
        let flag = posted.clone();
        let fake = Arc::new(FakeTransport::new(move |req| {
            if is_post(req) {
                flag.store(true, Ordering::SeqCst);
                page(200, "<html>Authentication success</html>")
            } else if req.host == GATEWAY {
                page(200, "")
            } else if flag.load(Ordering::SeqCst) {
                page(200, search_page())
            } else {
                page(200, portal_page("beef"))
            }
        }));
        let (tx, rx) = create_event_channel();
        let ctx = ServiceContext::new(fake, fast_settings()).with_events(tx);

        let outcome = AuthOrchestrator::new(ctx).run(&creds()).await;
        assert_eq!(outcome, LoginOutcome::Success);
        assert!(posted.load(Ordering::SeqCst));

        let mut stages = Vec::new();
        let mut finished = None;
        while let Some(event) = rx.try_recv() {
            match event {
                PortalEvent::StageChanged { stage } => stages.push(stage),
                PortalEvent::Finished { outcome, .. } => finished = Some(outcome),
                _ => {}
            }
        }
        assert_eq!(
            stages,
            vec![
                AuthStage::Idle,
                AuthStage::FetchingChallenge,
                AuthStage::ExtractingToken,
                AuthStage::EstablishingSession,
                AuthStage::Posting,
                AuthStage::Verifying,
                AuthStage::Done,
            ]
        );
        assert_eq!(finished, Some(LoginOutcome::Success));
    }

    #[tokio::test]
    async fn test_token_from_location_header() {
        let fake = Arc::new(FakeTransport::new(|req| {
            if is_post(req) {
                return page(403, "denied");
            }
            let mut headers = HeaderMap::new();
            headers.insert(
                LOCATION,
                HeaderValue::from_static("http://172.16.62.1:1000/fgtauth?0a0b"),
            );
            Ok(ProbeResult::new(303, headers, ""))
        }));
        let ctx = ServiceContext::new(fake.clone(), fast_settings());

        let outcome = AuthOrchestrator::new(ctx).run(&creds()).await;

        assert_eq!(outcome, LoginOutcome::Failed { status: 403 });
        assert!(fake.calls()[2].form.as_deref().unwrap().contains("magic=0a0b"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let fake = Arc::new(FakeTransport::new(|_| page(200, portal_page("abcd"))));
        let ctx = ServiceContext::new(fake.clone(), fast_settings());
        ctx.shutdown.cancel();

        let outcome = AuthOrchestrator::new(ctx).run(&creds()).await;
        assert_eq!(outcome, LoginOutcome::Cancelled);
        assert_eq!(fake.count(GATEWAY), 0);
    }

    #[tokio::test]
    async fn test_determine_login_result_mapping() {
        let verified = AtomicBool::new(false);
        let outcome = determine_login_result(500, "", || async {
            verified.store(true, Ordering::SeqCst);
            Ok(true)
        })
        .await
        .unwrap();
        assert_eq!(outcome, LoginOutcome::Failed { status: 500 });
        assert!(!verified.load(Ordering::SeqCst));
        assert_eq!(
            determine_login_result(0, "", || async { Ok(true) }).await.unwrap(),
            LoginOutcome::Failed { status: 0 }
        );

        for status in [301, 302, 303, 307, 308] {
            assert_eq!(
                determine_login_result(status, "", || async { Ok(true) }).await.unwrap(),
                LoginOutcome::Success
            );
            assert_eq!(
                determine_login_result(status, "", || async { Ok(false) }).await.unwrap(),
                LoginOutcome::SuccessUnconfirmed { acknowledged: true }
            );
        }

        assert_eq!(
            determine_login_result(200, "<p>歡迎</p>", || async { Ok(false) }).await.unwrap(),
            LoginOutcome::SuccessUnconfirmed { acknowledged: true }
        );
        assert_eq!(
            determine_login_result(200, "<p>ok</p>", || async { Ok(false) }).await.unwrap(),
            LoginOutcome::SuccessUnconfirmed { acknowledged: false }
        );
        assert!(matches!(
            determine_login_result(200, "", || async { Err(PortalError::Cancelled) }).await,
            Err(PortalError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_determine_login_result_is_deterministic() {
        for (status, body) in [(200, "welcome"), (302, ""), (404, "x"), (200, "")] {
            for verified in [true, false] {
                let first = determine_login_result(status, body, || async move { Ok(verified) })
                    .await
                    .unwrap();
                let second = determine_login_result(status, body, || async move { Ok(verified) })
                    .await
                    .unwrap();
                assert_eq!(first, second);
            }
        }
    }
}
