//! 服务上下文 (ServiceContext)
//!
//! 统一管理单次登录流程中的副作用：传输层、运行参数、取消令牌与事件发送。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::config::AuthSettings;
use crate::core::error::{PortalError, Result};
use crate::core::event::{AuthStage, EventSender, LogLevel};
use crate::core::model::{LoginOutcome, ProbeResult};
use crate::interfaces::{ProbeRequest, Transport};
use crate::portal::ConnectivityPolicy;

/// 服务上下文
///
/// 所有挂起点 (网络 IO 与固定等待) 都经由这里，以便统一响应取消。
#[derive(Clone)]
pub struct ServiceContext {
    /// 探测传输层
    pub transport: Arc<dyn Transport>,
    /// 运行参数
    pub settings: Arc<AuthSettings>,
    /// 取消令牌，由调用方持有
    pub shutdown: CancellationToken,
    /// 事件发送器（可选）
    pub events: Option<EventSender>,
}

impl ServiceContext {
    /// 创建新的服务上下文
    pub fn new(transport: Arc<dyn Transport>, settings: Arc<AuthSettings>) -> Self {
        Self {
            transport,
            settings,
            shutdown: CancellationToken::new(),
            events: None,
        }
    }

    /// 设置事件发送器
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// 使用调用方的取消令牌
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn stage(&self, stage: AuthStage) {
        if let Some(ref sender) = self.events {
            sender.stage(stage);
        }
    }

    pub fn verify_attempt(&self, attempt: u32, total: u32) {
        if let Some(ref sender) = self.events {
            sender.verify_attempt(attempt, total);
        }
    }

    pub fn finished(&self, outcome: &LoginOutcome) {
        if let Some(ref sender) = self.events {
            sender.finished(outcome);
        }
    }

    /// 转发给通知端的提示消息
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if let Some(ref sender) = self.events {
            sender.log(level, message);
        }
    }

    /// 按当前参数构造的连通性判定策略
    pub fn policy(&self) -> ConnectivityPolicy {
        ConnectivityPolicy::with_min_body_len(self.settings.min_body_len)
    }

    /// 可取消的探测
    pub async fn probe(&self, request: ProbeRequest) -> Result<ProbeResult> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(PortalError::Cancelled),
            result = self.transport.probe(request) => result,
        }
    }

    /// 可取消的等待
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(PortalError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
