//! 事件系统定义
//!
//! 用于登录流程与状态展示 (通知端) 之间的完全解耦通信

use flume::{Receiver, Sender};
use strum::Display;

use crate::core::model::LoginOutcome;

/// 登录状态机的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AuthStage {
    Idle,
    FetchingChallenge,
    AlreadyConnected,
    ExtractingToken,
    TokenMissing,
    EstablishingSession,
    Posting,
    Verifying,
    Done,
}

/// Portal 事件类型
#[derive(Debug, Clone)]
pub enum PortalEvent {
    /// 状态机进入新阶段
    StageChanged { stage: AuthStage },

    /// 外网验证的第 n 次尝试
    VerifyAttempt { attempt: u32, total: u32 },

    /// 单次登录流程结束
    Finished { outcome: LoginOutcome, message: String },

    /// watch 模式的宿主状态刷新
    HostStatus { wifi: String, login: String },

    /// 日志消息（用于 UI 显示）
    Log { level: LogLevel, message: String },
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
}

/// 事件发送器
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<PortalEvent>,
}

impl EventSender {
    pub fn new(tx: Sender<PortalEvent>) -> Self {
        Self { tx }
    }

    /// 发送事件
    pub fn emit(&self, event: PortalEvent) {
        let _ = self.tx.send(event);
    }

    pub fn stage(&self, stage: AuthStage) {
        self.emit(PortalEvent::StageChanged { stage });
    }

    pub fn verify_attempt(&self, attempt: u32, total: u32) {
        self.emit(PortalEvent::VerifyAttempt { attempt, total });
    }

    pub fn finished(&self, outcome: &LoginOutcome) {
        self.emit(PortalEvent::Finished {
            outcome: outcome.clone(),
            message: outcome.message(),
        });
    }

    pub fn host_status(&self, wifi: &str, login: &str) {
        self.emit(PortalEvent::HostStatus {
            wifi: wifi.to_string(),
            login: login.to_string(),
        });
    }

    /// 发送日志事件
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(PortalEvent::Log {
            level,
            message: message.into(),
        });
    }
}

/// 事件接收器
pub struct EventReceiver {
    rx: Receiver<PortalEvent>,
}

impl EventReceiver {
    pub fn new(rx: Receiver<PortalEvent>) -> Self {
        Self { rx }
    }

    /// 非阻塞接收事件
    #[cfg(test)]
    pub fn try_recv(&self) -> Option<PortalEvent> {
        self.rx.try_recv().ok()
    }

    /// 异步接收事件
    pub async fn recv_async(&self) -> Option<PortalEvent> {
        self.rx.recv_async().await.ok()
    }
}

/// 创建事件通道
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = flume::unbounded();
    (EventSender::new(tx), EventReceiver::new(rx))
}
