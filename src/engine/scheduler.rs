//! 定时巡检 (Watch Scheduler)
//!
//! 周期性读取 SSID 与配置，在门户网络上自动登录。
//! 宿主状态由循环自身持有；同一时刻最多一个登录流程在途。

use std::sync::Arc;
use std::time::Duration;

use strum::Display;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::config::{AppConfig, AuthSettings};
use crate::core::error::Result;
use crate::core::event::EventSender;
use crate::core::model::{Credentials, LoginOutcome};
use crate::engine::orchestrator::AuthOrchestrator;
use crate::interfaces::{SsidSource, Transport};
use crate::network::context::ServiceContext;

/// 每个巡检周期读取配置的方式
pub type ConfigLoader = Arc<dyn Fn() -> Result<AppConfig> + Send + Sync>;

/// 跳过登录的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SkipReason {
    #[strum(to_string = "Not on the portal network")]
    NotOnPortal,
    #[strum(to_string = "Credentials not set")]
    CredentialsMissing,
    #[strum(to_string = "Auto-login disabled")]
    AutoLoginDisabled,
}

/// 单个巡检周期的决策
#[derive(Debug, Clone)]
pub enum TickPlan {
    Login(Credentials),
    Skip(SkipReason),
}

/// 根据当前 SSID 与配置决定本周期是否登录
pub fn plan(ssid: Option<&str>, config: &AppConfig) -> TickPlan {
    if ssid != Some(config.network.ssid.as_str()) {
        return TickPlan::Skip(SkipReason::NotOnPortal);
    }

    let Some(credentials) = config.credentials() else {
        return TickPlan::Skip(SkipReason::CredentialsMissing);
    };

    if !config.auto_login {
        return TickPlan::Skip(SkipReason::AutoLoginDisabled);
    }

    TickPlan::Login(credentials)
}

/// 宿主可见的状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchState {
    pub wifi: String,
    pub login: String,
}

impl Default for WatchState {
    fn default() -> Self {
        Self {
            wifi: "(not connected)".to_string(),
            login: "-".to_string(),
        }
    }
}

impl WatchState {
    fn set_wifi(&mut self, ssid: Option<&str>) {
        self.wifi = ssid.unwrap_or("(not connected)").to_string();
    }
}

/// 巡检器
pub struct Watcher {
    transport: Arc<dyn Transport>,
    ssid_source: Arc<dyn SsidSource>,
    loader: ConfigLoader,
    poll_interval: Duration,
    shutdown: CancellationToken,
    events: Option<EventSender>,
    slot: Arc<Mutex<()>>,
    state: WatchState,
}

impl Watcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        ssid_source: Arc<dyn SsidSource>,
        loader: ConfigLoader,
        poll_interval: Duration,
    ) -> Self {
        Self {
            transport,
            ssid_source,
            loader,
            poll_interval,
            shutdown: CancellationToken::new(),
            events: None,
            slot: Arc::new(Mutex::new(())),
            state: WatchState::default(),
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// 运行至取消；返回前等待在途的登录流程退出
    pub async fn run(mut self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let (done_tx, done_rx) = flume::unbounded::<LoginOutcome>();

        info!("Watching Wi-Fi every {:?}", self.poll_interval);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Ok(outcome) = done_rx.recv_async() => {
                    self.state.login = outcome.message();
                    self.publish();
                }
                _ = ticker.tick() => self.tick(&done_tx).await,
            }
        }

        let _idle = self.slot.lock().await;
        info!("Watch loop stopped");
        Ok(())
    }

    /// 执行一个巡检周期；登录在后台任务中进行，结果经 `done` 回传
    pub async fn tick(&mut self, done: &flume::Sender<LoginOutcome>) {
        let config = match (self.loader)() {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to reload config: {}", e);
                self.state.login = "Config error".to_string();
                self.publish();
                return;
            }
        };

        // 外部命令可能卡住，取消时立即放弃本轮
        let ssid = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return,
            ssid = self.ssid_source.current_ssid() => ssid,
        };
        debug!(ssid = ?ssid, "SSID detected");
        self.state.set_wifi(ssid.as_deref());

        match plan(ssid.as_deref(), &config) {
            TickPlan::Skip(reason) => {
                self.state.login = reason.to_string();
            }
            TickPlan::Login(credentials) => {
                let Ok(guard) = self.slot.clone().try_lock_owned() else {
                    debug!("Login already in flight, skipping tick");
                    return;
                };

                let settings = match AuthSettings::from_config(&config) {
                    Ok(s) => Arc::new(s),
                    Err(e) => {
                        warn!("Invalid probe settings: {}", e);
                        self.state.login = "Config error".to_string();
                        self.publish();
                        return;
                    }
                };

                let mut ctx = ServiceContext::new(self.transport.clone(), settings)
                    .with_shutdown(self.shutdown.child_token());
                if let Some(ref sender) = self.events {
                    ctx = ctx.with_events(sender.clone());
                }

                self.state.login = "Portal network detected, logging in...".to_string();

                let done = done.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    let outcome = AuthOrchestrator::new(ctx).run(&credentials).await;
                    let _ = done.send(outcome);
                });
            }
        }

        self.publish();
    }

    fn publish(&self) {
        info!(wifi = %self.state.wifi, "{}", self.state.login);
        if let Some(ref sender) = self.events {
            sender.host_status(&self.state.wifi, &self.state.login);
        }
    }
}
