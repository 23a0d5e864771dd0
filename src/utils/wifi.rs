//! Wi-Fi SSID 读取 (SSID Source)
//!
//! 按平台调用系统命令：Linux 用 `nmcli`，Windows 用 `netsh`，macOS 用 `ipconfig getsummary`。
//! 任何失败都视为“无 SSID”。

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use crate::interfaces::SsidSource;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// 基于系统命令的 SSID 来源
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandSsidSource;

#[async_trait]
impl SsidSource for CommandSsidSource {
    async fn current_ssid(&self) -> Option<String> {
        if cfg!(target_os = "linux") {
            let out = run("nmcli", &["-t", "-f", "active,ssid", "dev", "wifi"]).await?;
            parse_nmcli(&out)
        } else if cfg!(target_os = "windows") {
            let out = run("netsh", &["wlan", "show", "interfaces"]).await?;
            parse_netsh(&out)
        } else if cfg!(target_os = "macos") {
            for iface in ["en0", "en1", "en2"] {
                if let Some(ssid) = run("ipconfig", &["getsummary", iface])
                    .await
                    .and_then(|out| parse_ipconfig_summary(&out))
                {
                    return Some(ssid);
                }
            }
            None
        } else {
            None
        }
    }
}

async fn run(program: &str, args: &[&str]) -> Option<String> {
    let output = tokio::time::timeout(COMMAND_TIMEOUT, Command::new(program).args(args).kill_on_drop(true).output())
        .await
        .ok()?;

    match output {
        Ok(out) if out.status.success() => Some(String::from_utf8_lossy(&out.stdout).into_owned()),
        Ok(out) => {
            debug!(program, status = %out.status, "SSID command failed");
            None
        }
        Err(e) => {
            debug!(program, "SSID command unavailable: {}", e);
            None
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// `nmcli -t -f active,ssid dev wifi` 输出中处于活动状态的第一行
pub fn parse_nmcli(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("yes:"))
        .and_then(non_empty)
}

/// `netsh wlan show interfaces` 输出中的 `SSID : name` (不含 BSSID，兼容全角冒号)
pub fn parse_netsh(output: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?m)^\s*SSID\s*[:\x{FF1A}]\s*(.+)$").unwrap());

    re.captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| non_empty(m.as_str()))
}

/// `ipconfig getsummary <iface>` 输出中的 ` SSID : name`
pub fn parse_ipconfig_summary(output: &str) -> Option<String> {
    output
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim() == "SSID")
        .and_then(|(_, value)| non_empty(value))
}
