//! 应用程序入口 (Application Entrypoint)
//!
//! 负责 CLI 指令解析、遥测层初始化、依赖注入及系统生命周期管理。

mod core;
mod engine;
mod interfaces;
mod network;
mod portal;
mod ui;
mod utils;

use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::fmt::MakeWriter;

use crate::core::config::{AppConfig, AuthSettings};
use crate::core::event::create_event_channel;
use crate::core::model::{Credentials, LoginOutcome, ProbeResult};
use crate::engine::scheduler::ConfigLoader;
use crate::engine::{AuthOrchestrator, Watcher, find_token};
use crate::interfaces::{ProbeRequest, Transport};
use crate::network::context::ServiceContext;
use crate::network::service::HttpService;
use crate::portal::ConnectivityPolicy;
use crate::portal::parser::parse_transcript;
use crate::ui::{Ui, get_multi};
use crate::utils::wifi::CommandSsidSource;

/// 进度条感知的日志写入器 (TUI-aware Log Writer)
///
/// 确保非同步日志输出不会破坏终端进度条的渲染布局。
struct IndicatifWriter;

impl io::Write for IndicatifWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let _ = get_multi().println(s.trim_end());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for IndicatifWriter {
    type Writer = IndicatifWriter;

    fn make_writer(&self) -> Self::Writer {
        IndicatifWriter
    }
}

/// 命令行界面脚手架 (CLI Scaffolding)
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置文件路径 (默认 ./config.toml 或系统配置目录)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 执行一次门户登录
    Login {
        /// 覆盖配置中的账号
        #[arg(short, long)]
        username: Option<String>,
        /// 覆盖配置中的口令
        #[arg(short, long)]
        password: Option<String>,
        /// 出站绑定的本地地址
        #[arg(short, long)]
        bind: Option<IpAddr>,
        /// 以 JSON 输出结果
        #[arg(long)]
        json: bool,
    },
    /// 只探测当前连通状态
    Status {
        #[arg(short, long)]
        bind: Option<IpAddr>,
        #[arg(long)]
        json: bool,
    },
    /// 解析抓取到的原始响应 (curl -i 输出)
    Inspect {
        /// 原始报文文件
        file: PathBuf,
        /// curl -v 的 stderr 记录
        #[arg(short, long)]
        trace: Option<PathBuf>,
    },
    /// 定时检测 Wi-Fi 并自动登录
    Watch,
}

#[derive(Serialize)]
struct LoginReport<'a> {
    #[serde(flatten)]
    outcome: &'a LoginOutcome,
    message: String,
}

#[derive(Serialize)]
struct ProbeReport {
    status: u16,
    verdict: String,
    token: Option<String>,
    body_len: usize,
}

impl ProbeReport {
    fn new(result: &ProbeResult, policy: &ConnectivityPolicy) -> Self {
        Self {
            status: result.status_code,
            verdict: policy.classify(&result.body, result.status_code).to_string(),
            token: find_token(result).map(|t| t.to_string()),
            body_len: result.body.chars().count(),
        }
    }

    fn print(&self) {
        println!("status:  {}", self.status);
        println!("verdict: {}", self.verdict);
        println!("token:   {}", self.token.as_deref().unwrap_or("-"));
        println!("body:    {} chars", self.body_len);
    }
}

/// Ctrl-C 时取消所有在途流程
fn cancel_on_ctrl_c() -> CancellationToken {
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling...");
            token.cancel();
        }
    });
    shutdown
}

/// 命令行参数优先，缺失的部分回退到配置
fn resolve_credentials(
    config: &AppConfig,
    username: Option<String>,
    password: Option<String>,
) -> Option<Credentials> {
    let creds = Credentials::new(
        username.unwrap_or_else(|| config.credentials.username.clone()),
        password.unwrap_or_else(|| config.credentials.password.expose().to_string()),
    );
    creds.is_complete().then_some(creds)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // 遥测层初始化 (Telemetry Layer Initialization)
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(IndicatifWriter)
        .with_target(false)
        .with_ansi(true)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Login {
            username,
            password,
            bind,
            json,
        } => {
            let Some(credentials) = resolve_credentials(&config, username, password) else {
                anyhow::bail!("credentials not set: add [credentials] to config.toml or pass --username/--password");
            };

            let settings = Arc::new(AuthSettings::from_config(&config)?);
            let http = Arc::new(HttpService::new(bind.or(config.network.bind_address))?);

            // 建立 UI 事件反馈链路 (Event feedback loop)
            let (event_sender, event_receiver) = create_event_channel();
            let ui_handle = Ui::run(event_receiver);

            // 任务域限制，离开作用域后事件发送端关闭
            let outcome = {
                let ctx = ServiceContext::new(http, settings)
                    .with_shutdown(cancel_on_ctrl_c())
                    .with_events(event_sender);
                AuthOrchestrator::new(ctx).run(&credentials).await
            };

            let _ = ui_handle.await;

            if json {
                let report = LoginReport {
                    outcome: &outcome,
                    message: outcome.message(),
                };
                println!("{}", serde_json::to_string(&report)?);
            } else {
                println!("{}", outcome.message());
            }

            Ok(if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Commands::Status { bind, json } => {
            let settings = AuthSettings::from_config(&config)?;
            let http = HttpService::new(bind.or(config.network.bind_address))?;
            let request = ProbeRequest::from_url(&settings.probe_url)?.with_timeout(settings.probe_timeout);

            let result = match http.probe(request).await {
                Ok(r) => r,
                Err(e) => {
                    let outcome = LoginOutcome::from(e);
                    println!("{}", outcome.message());
                    return Ok(ExitCode::FAILURE);
                }
            };

            let report = ProbeReport::new(&result, &ConnectivityPolicy::with_min_body_len(settings.min_body_len));
            if json {
                println!("{}", serde_json::to_string(&report)?);
            } else {
                report.print();
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Inspect { file, trace } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let trace = match trace {
                Some(path) => Some(
                    tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("failed to read {}", path.display()))?,
                ),
                None => None,
            };

            let result = parse_transcript(&raw, trace.as_deref());
            ProbeReport::new(&result, &ConnectivityPolicy::with_min_body_len(config.probe.min_body_len)).print();
            Ok(ExitCode::SUCCESS)
        }

        Commands::Watch => {
            let http = Arc::new(HttpService::new(config.network.bind_address)?);
            let path = cli.config.clone();
            let loader: ConfigLoader = Arc::new(move || AppConfig::load(path.as_deref()));
            let interval = Duration::from_secs(config.network.poll_interval_secs.max(1));

            let (event_sender, event_receiver) = create_event_channel();
            let ui_handle = Ui::run(event_receiver);

            Watcher::new(http, Arc::new(CommandSsidSource), loader, interval)
                .with_events(event_sender)
                .with_shutdown(cancel_on_ctrl_c())
                .run()
                .await?;

            let _ = ui_handle.await;
            Ok(ExitCode::SUCCESS)
        }
    }
}
