//! 错误处理体系 (Error Handling System)
//!
//! 定义传输层错误分类、领域错误类型以及全局 Result 别名。

use std::error::Error as StdError;
use std::io;

use serde::Serialize;
use strum::{Display, IntoStaticStr};
use thiserror::Error;

/// 传输层失败类别 (Transport Failure Kinds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransportKind {
    /// 对端拒绝连接 (ECONNREFUSED)
    Refused,
    /// 连接或读取超时
    Timeout,
    /// 网络/主机不可达，或域名无法解析
    Unreachable,
    /// 连接被对端重置 (socket hang up)
    Reset,
    Unknown,
}

impl TransportKind {
    /// 由底层 IO 错误类别映射
    pub fn from_io(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::ConnectionRefused => Self::Refused,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Self::Reset,
            io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkDown
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::NotConnected => Self::Unreachable,
            _ => Self::Unknown,
        }
    }

    /// 按错误文本兜底匹配
    ///
    /// hyper/reqwest 有时只保留字符串形式的底层错误。
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("refused") {
            Self::Refused
        } else if lower.contains("timed out") || lower.contains("timeout") {
            Self::Timeout
        } else if lower.contains("reset") || lower.contains("hang up") || lower.contains("closed before") {
            Self::Reset
        } else if lower.contains("unreachable")
            || lower.contains("dns error")
            || lower.contains("failed to lookup")
            || lower.contains("no route to host")
        {
            Self::Unreachable
        } else {
            Self::Unknown
        }
    }

    /// 面向用户的简短状态文本
    pub fn message(&self) -> &'static str {
        match self {
            Self::Refused => "Campus network server refused connection",
            Self::Timeout => "Connection timed out (make sure you are on the portal Wi-Fi)",
            Self::Unreachable => "Network unreachable (make sure you are on the portal Wi-Fi)",
            Self::Reset => "Connection reset by the portal server",
            Self::Unknown => "Unexpected network error during login",
        }
    }
}

/// 全局错误定义 (Portal Domain Errors)
#[derive(Error, Debug)]
pub enum PortalError {
    /// 网络传输失败，已归类
    #[error("Transport error ({kind}): {detail}")]
    Transport { kind: TransportKind, detail: String },

    /// 调用方取消了本次尝试
    #[error("Attempt cancelled")]
    Cancelled,

    #[error("HTTP client construction failed: {0}")]
    Client(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// 只支持明文 http
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    #[error("Form encoding error: {0}")]
    Form(#[from] serde_urlencoded::ser::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// 全局 Result 别名
pub type Result<T> = std::result::Result<T, PortalError>;

impl PortalError {
    pub fn transport(kind: TransportKind, detail: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            detail: detail.into(),
        }
    }

    /// 提取传输层失败类别
    pub fn transport_kind(&self) -> Option<TransportKind> {
        match self {
            PortalError::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        let kind = classify_reqwest(&err);
        PortalError::transport(kind, err.to_string())
    }
}

impl From<reqwest_middleware::Error> for PortalError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            reqwest_middleware::Error::Middleware(e) => match e.downcast::<PortalError>() {
                Ok(inner) => inner,
                Err(other) => PortalError::transport(TransportKind::Unknown, other.to_string()),
            },
        }
    }
}

/// 对 reqwest 错误做分层解包 (Downcasting)，定位真实的 IO 错误
fn classify_reqwest(err: &reqwest::Error) -> TransportKind {
    if err.is_timeout() {
        return TransportKind::Timeout;
    }

    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            let kind = TransportKind::from_io(io_err.kind());
            if kind != TransportKind::Unknown {
                return kind;
            }
        }
        let by_text = TransportKind::from_message(&cause.to_string());
        if by_text != TransportKind::Unknown {
            return by_text;
        }
        source = cause.source();
    }

    if err.is_connect() {
        TransportKind::Unreachable
    } else {
        TransportKind::Unknown
    }
}
