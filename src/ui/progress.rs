//! 终端状态渲染 (Terminal Status Display)
//!
//! 基于 `indicatif` 的通知端：消费 `PortalEvent`，以 spinner 展示登录阶段与宿主状态。

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::core::event::{AuthStage, EventReceiver, LogLevel, PortalEvent};

/// 全局 TUI 容器 (Singleton)
static MULTI: OnceLock<MultiProgress> = OnceLock::new();

/// 获取全局进度容器实例
pub fn get_multi() -> &'static MultiProgress {
    MULTI.get_or_init(MultiProgress::new)
}

/// TUI 状态容器
pub struct UiState {
    /// 当前登录流程的 spinner
    login_bar: Option<ProgressBar>,
    /// watch 模式的宿主状态行
    host_bar: Option<ProgressBar>,
}

impl UiState {
    fn new() -> Self {
        Self {
            login_bar: None,
            host_bar: None,
        }
    }
}

static STATE: OnceLock<Arc<RwLock<UiState>>> = OnceLock::new();

fn get_state() -> &'static Arc<RwLock<UiState>> {
    STATE.get_or_init(|| Arc::new(RwLock::new(UiState::new())))
}

fn spinner(color: &str) -> ProgressBar {
    let style = ProgressStyle::default_spinner()
        .template(&format!("{{spinner:.{}}} [{{elapsed_precise}}] {{msg}}", color))
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let bar = get_multi().add(ProgressBar::new_spinner());
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// 阶段的展示文本
pub fn stage_label(stage: AuthStage) -> &'static str {
    match stage {
        AuthStage::Idle => "Starting",
        AuthStage::FetchingChallenge => "Probing internet",
        AuthStage::AlreadyConnected => "Already online",
        AuthStage::ExtractingToken => "Reading portal page",
        AuthStage::TokenMissing => "No portal token found",
        AuthStage::EstablishingSession => "Opening portal session",
        AuthStage::Posting => "Submitting credentials",
        AuthStage::Verifying => "Verifying internet",
        AuthStage::Done => "Done",
    }
}

/// 通知端 (Notification Sink)
pub struct Ui;

impl Ui {
    /// 启动事件监听循环，所有发送端关闭后退出
    pub fn run(receiver: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = receiver.recv_async().await {
                Self::handle_event(event);
            }
        })
    }

    fn handle_event(event: PortalEvent) {
        let state = get_state();
        let mut ui = state.write();

        match event {
            PortalEvent::StageChanged { stage } => {
                if stage == AuthStage::Idle || ui.login_bar.is_none() {
                    ui.login_bar = Some(spinner("green"));
                }
                if let Some(ref bar) = ui.login_bar {
                    bar.set_message(format!("🔐 {}", stage_label(stage)));
                }
            }
            PortalEvent::VerifyAttempt { attempt, total } => {
                if let Some(ref bar) = ui.login_bar {
                    bar.set_message(format!("🌐 Verifying internet ({}/{})", attempt, total));
                }
            }
            PortalEvent::Finished { outcome, message } => {
                if let Some(bar) = ui.login_bar.take() {
                    if outcome.is_success() {
                        bar.finish_with_message(format!("✅ {}", message));
                    } else {
                        bar.abandon_with_message(format!("❌ {}", message));
                    }
                }
            }
            PortalEvent::HostStatus { wifi, login } => {
                if ui.host_bar.is_none() {
                    ui.host_bar = Some(spinner("cyan"));
                }
                if let Some(ref bar) = ui.host_bar {
                    bar.set_message(format!("📶 {} | {}", truncate_string(&wifi, 24), login));
                }
            }
            PortalEvent::Log { level, message } => {
                let prefix = match level {
                    LogLevel::Warn => "⚠️ ",
                    LogLevel::Info => "",
                };
                let _ = get_multi().println(format!("{}{}", prefix, message));
            }
        }
    }
}

/// 执行语义化字符串截断
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}
