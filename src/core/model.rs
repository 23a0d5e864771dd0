use std::fmt;

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::core::error::{PortalError, TransportKind};

/// 单次 HTTP 探测结果
///
/// `status_code == 0` 表示未能得到状态码，调用方必须视作“未知”而非成功。
#[derive(Debug, Clone, Default)]
pub struct ProbeResult {
    pub status_code: u16,
    /// 头部名称大小写不敏感
    pub headers: HeaderMap,
    pub body: String,
}

impl ProbeResult {
    pub fn new(status_code: u16, headers: HeaderMap, body: impl Into<String>) -> Self {
        Self {
            status_code,
            headers,
            body: body.into(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.header(reqwest::header::LOCATION.as_str())
    }
}

/// 连通性判定
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum ConnectivityVerdict {
    Connected,
    NotConnected,
    /// 没有拿到任何可判断的内容
    Indeterminate(String),
}

impl ConnectivityVerdict {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectivityVerdict::Connected)
    }
}

impl fmt::Display for ConnectivityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityVerdict::Connected => write!(f, "Connected"),
            ConnectivityVerdict::NotConnected => write!(f, "NotConnected"),
            ConnectivityVerdict::Indeterminate(reason) => write!(f, "Indeterminate({})", reason),
        }
    }
}

/// 门户下发的一次性会话令牌 (magic)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    /// 仅接受非空的十六进制串
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 不会出现在日志中的口令
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 仅在构造登录表单时调用
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// 登录凭据，由调用方持有并传入
#[derive(Debug, Clone)]
pub struct Credentials {
    pub identifier: String,
    pub secret: Secret,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: Secret::new(secret),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.identifier.trim().is_empty() && !self.secret.is_empty()
    }
}

/// 单次登录流程的终态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(tag = "outcome", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LoginOutcome {
    /// 登录成功且外网已恢复
    Success,
    /// 门户已接受登录，但外网验证未通过
    ///
    /// `acknowledged` 为真表示门户给出了明确的成功信号 (重定向或成功关键字)。
    SuccessUnconfirmed { acknowledged: bool },
    AlreadyConnected,
    /// 响应中找不到 magic
    AuthParamsUnavailable,
    Failed { status: u16 },
    TransportError { kind: TransportKind },
    Cancelled,
}

impl LoginOutcome {
    /// 面向用户的状态文本
    pub fn message(&self) -> String {
        match self {
            LoginOutcome::Success => "Login succeeded".to_string(),
            LoginOutcome::SuccessUnconfirmed { acknowledged: true } => {
                "Login succeeded, but DNS has not refreshed yet".to_string()
            }
            LoginOutcome::SuccessUnconfirmed { acknowledged: false } => {
                "Server reported success, but the internet is still unreachable".to_string()
            }
            LoginOutcome::AlreadyConnected => {
                "Already connected to the internet, no login needed".to_string()
            }
            LoginOutcome::AuthParamsUnavailable => {
                "Could not obtain authentication parameters; make sure you are on the portal Wi-Fi"
                    .to_string()
            }
            LoginOutcome::Failed { status } => format!("Login failed (HTTP {})", status),
            LoginOutcome::TransportError { kind } => kind.message().to_string(),
            LoginOutcome::Cancelled => "Login cancelled".to_string(),
        }
    }

    /// 是否可视为“不需要用户介入”
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            LoginOutcome::Success
                | LoginOutcome::SuccessUnconfirmed { .. }
                | LoginOutcome::AlreadyConnected
        )
    }
}

impl From<PortalError> for LoginOutcome {
    fn from(err: PortalError) -> Self {
        match err {
            PortalError::Cancelled => LoginOutcome::Cancelled,
            other => LoginOutcome::TransportError {
                kind: other.transport_kind().unwrap_or(TransportKind::Unknown),
            },
        }
    }
}
