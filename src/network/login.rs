use indexmap::IndexMap;
use tracing::info;

use crate::core::constants::{FIELD_MAGIC, FIELD_PASSWORD, FIELD_REDIRECT, FIELD_USERNAME};
use crate::core::error::Result;
use crate::core::model::{AuthToken, Credentials, ProbeResult};
use crate::interfaces::ProbeRequest;
use crate::network::context::ServiceContext;
use crate::utils::format_username;

/// 构造登录表单，字段顺序固定为 username, password, magic, 4Tredir
pub fn build_form(credentials: &Credentials, token: &AuthToken, redirect_target: &str) -> Result<String> {
    let username = format_username(&credentials.identifier);

    let mut fields: IndexMap<&str, &str> = IndexMap::with_capacity(4);
    fields.insert(FIELD_USERNAME, &username);
    fields.insert(FIELD_PASSWORD, credentials.secret.expose());
    fields.insert(FIELD_MAGIC, token.as_str());
    fields.insert(FIELD_REDIRECT, redirect_target);

    Ok(serde_urlencoded::to_string(&fields)?)
}

/// 登录提交 (LoginSubmitter)
///
/// 向固定网关 POST 表单。连接被拒、超时、重置都以传输错误返回，
/// 与“请求送达但被门户拒绝”严格区分。
pub struct LoginSubmitter<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> LoginSubmitter<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn submit(
        &self,
        credentials: &Credentials,
        token: &AuthToken,
        redirect_target: &str,
    ) -> Result<ProbeResult> {
        let settings = &self.ctx.settings;
        let form = build_form(credentials, token, redirect_target)?;

        info!(
            username = %format_username(&credentials.identifier),
            magic = %token,
            gateway = %settings.gateway_url("/"),
            "Submitting login form"
        );

        let request = ProbeRequest::post_form(settings.gateway_host.clone(), settings.gateway_port, "/", form)
            .with_timeout(settings.submit_timeout);

        let resp = self.ctx.probe(request).await?;
        info!(status = resp.status_code, "Login response received");
        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use reqwest::Method;

    use super::*;
    use crate::core::config::AuthSettings;
    use crate::core::error::TransportKind;
    use crate::network::testing::{FakeTransport, fail, page};

    fn creds() -> Credentials {
        Credentials::new("C110152000", "p@ss word")
    }

    #[test]
    fn test_form_field_order_and_encoding() {
        let token = AuthToken::parse("1a2b3c4d").unwrap();
        let form = build_form(&creds(), &token, "http://www.google.com/").unwrap();
        assert_eq!(
            form,
            "username=C110152000%40nkust.edu.tw&password=p%40ss+word&magic=1a2b3c4d&4Tredir=http%3A%2F%2Fwww.google.com%2F"
        );
    }

    #[tokio::test]
    async fn test_submit_posts_to_gateway() {
        let fake = Arc::new(FakeTransport::new(|_| page(303, "")));
        let ctx = ServiceContext::new(fake.clone(), Arc::new(AuthSettings::default()));
        let token = AuthToken::parse("abcd").unwrap();

        let resp = LoginSubmitter::new(&ctx)
            .submit(&creds(), &token, "http://www.google.com/")
            .await
            .unwrap();
        assert_eq!(resp.status_code, 303);

        let call = &fake.calls()[0];
        assert_eq!(call.method, Method::POST);
        assert_eq!(call.url(), "http://172.16.62.1:1000/");
        assert!(call.form.as_deref().unwrap().contains("magic=abcd"));
    }

    #[tokio::test]
    async fn test_submit_surfaces_transport_errors() {
        let fake = Arc::new(FakeTransport::new(|_| fail(TransportKind::Reset)));
        let ctx = ServiceContext::new(fake, Arc::new(AuthSettings::default()));
        let token = AuthToken::parse("abcd").unwrap();

        let err = LoginSubmitter::new(&ctx)
            .submit(&creds(), &token, "http://www.google.com/")
            .await
            .unwrap_err();
        assert_eq!(err.transport_kind(), Some(TransportKind::Reset));
    }
}
