//! 配置管理系统 (Configuration Management)
//!
//! 负责 `config.toml` 的反序列化及其层级结构映射，支持 `PORTAL_*` 环境变量覆盖与默认值回退。

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;
use url::Url;

use crate::core::constants;
use crate::core::error::{PortalError, Result};
use crate::core::model::{Credentials, Secret};
use crate::interfaces::ProbeRequest;

/// 全局应用配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct AppConfig {
    /// 登录凭据
    #[serde(default)]
    #[builder(default)]
    pub credentials: CredentialsConfig,

    /// 检测到门户网络时是否自动登录
    #[serde(default = "default_auto_login")]
    #[builder(default = true)]
    pub auto_login: bool,

    /// 网络环境 (SSID、出口地址、轮询周期)
    #[serde(default)]
    #[builder(default)]
    pub network: NetworkConfig,

    /// 探测与提交的超时参数
    #[serde(default)]
    #[builder(default)]
    pub probe: ProbeConfig,

    /// 登录后的外网验证参数
    #[serde(default)]
    #[builder(default)]
    pub verify: VerifyConfig,
}

/// 凭据配置
#[derive(Debug, Deserialize, Builder, Clone, Default)]
pub struct CredentialsConfig {
    #[serde(default)]
    #[builder(default)]
    pub username: String,
    #[serde(default)]
    #[builder(default)]
    pub password: Secret,
}

/// 网络环境配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct NetworkConfig {
    /// 门户 Wi-Fi 名称
    #[serde(default = "default_ssid")]
    #[builder(default = default_ssid())]
    pub ssid: String,
    /// 出站请求绑定的本地地址 (强制走 Wi-Fi 网卡)
    pub bind_address: Option<IpAddr>,
    /// watch 模式的轮询周期
    #[serde(default = "default_poll_interval")]
    #[builder(default = default_poll_interval())]
    pub poll_interval_secs: u64,
}

/// 探测参数
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct ProbeConfig {
    /// 外网探测地址 (仅支持 http)
    #[serde(default = "default_probe_url")]
    #[builder(default = default_probe_url())]
    pub url: String,
    #[serde(default = "default_probe_timeout")]
    #[builder(default = default_probe_timeout())]
    pub timeout_secs: u64,
    #[serde(default = "default_session_timeout")]
    #[builder(default = default_session_timeout())]
    pub session_timeout_secs: u64,
    #[serde(default = "default_submit_timeout")]
    #[builder(default = default_submit_timeout())]
    pub submit_timeout_secs: u64,
    #[serde(default = "default_verify_timeout")]
    #[builder(default = default_verify_timeout())]
    pub verify_timeout_secs: u64,
    /// 判定为真实页面的最小长度
    #[serde(default = "default_min_body_len")]
    #[builder(default = default_min_body_len())]
    pub min_body_len: usize,
}

/// 外网验证参数
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct VerifyConfig {
    #[serde(default = "default_verify_attempts")]
    #[builder(default = default_verify_attempts())]
    pub attempts: u32,
    #[serde(default = "default_verify_delay")]
    #[builder(default = default_verify_delay())]
    pub delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            credentials: CredentialsConfig::default(),
            auto_login: default_auto_login(),
            network: NetworkConfig::default(),
            probe: ProbeConfig::default(),
            verify: VerifyConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ssid: default_ssid(),
            bind_address: None,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            url: default_probe_url(),
            timeout_secs: default_probe_timeout(),
            session_timeout_secs: default_session_timeout(),
            submit_timeout_secs: default_submit_timeout(),
            verify_timeout_secs: default_verify_timeout(),
            min_body_len: default_min_body_len(),
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            attempts: default_verify_attempts(),
            delay_ms: default_verify_delay(),
        }
    }
}

fn default_auto_login() -> bool {
    true
}
fn default_ssid() -> String {
    constants::PORTAL_SSID.to_string()
}
fn default_poll_interval() -> u64 {
    constants::POLL_INTERVAL.as_secs()
}
fn default_probe_url() -> String {
    constants::PROBE_URL.to_string()
}
fn default_probe_timeout() -> u64 {
    constants::PROBE_TIMEOUT.as_secs()
}
fn default_session_timeout() -> u64 {
    constants::SESSION_TIMEOUT.as_secs()
}
fn default_submit_timeout() -> u64 {
    constants::SUBMIT_TIMEOUT.as_secs()
}
fn default_verify_timeout() -> u64 {
    constants::VERIFY_TIMEOUT.as_secs()
}
fn default_min_body_len() -> usize {
    constants::MIN_BODY_LEN
}
fn default_verify_attempts() -> u32 {
    constants::VERIFY_ATTEMPTS
}
fn default_verify_delay() -> u64 {
    constants::VERIFY_DELAY.as_millis() as u64
}

impl AppConfig {
    /// 从文件系统与环境变量中加载并解析配置
    ///
    /// 查找顺序：显式路径 > 工作目录 `config.toml` > 平台配置目录。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let builder = Config::builder();

        let builder = match Self::locate(path) {
            Some(file) => builder.add_source(File::from(file.as_path()).required(path.is_some())),
            None => builder,
        };

        let builder = builder.add_source(
            Environment::with_prefix("PORTAL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build().map_err(PortalError::Config)?;
        settings.try_deserialize().map_err(PortalError::Config)
    }

    fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        let local = PathBuf::from("config.toml");
        if local.exists() {
            return Some(local);
        }

        ProjectDirs::from("tw", "nkust", "portal-login")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .filter(|p| p.exists())
    }

    /// 已填写完整时返回凭据
    pub fn credentials(&self) -> Option<Credentials> {
        let creds = Credentials {
            identifier: self.credentials.username.clone(),
            secret: self.credentials.password.clone(),
        };
        creds.is_complete().then_some(creds)
    }
}

/// 单次登录流程使用的运行参数
///
/// 网关地址默认取部署常量，配置文件不暴露这两项。
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub probe_url: String,
    pub gateway_host: String,
    pub gateway_port: u16,
    pub redirect_target: String,
    pub probe_timeout: Duration,
    pub session_timeout: Duration,
    pub submit_timeout: Duration,
    pub verify_timeout: Duration,
    pub pre_post_delay: Duration,
    pub verify_attempts: u32,
    pub verify_delay: Duration,
    pub min_body_len: usize,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            probe_url: constants::PROBE_URL.to_string(),
            gateway_host: constants::GATEWAY_HOST.to_string(),
            gateway_port: constants::GATEWAY_PORT,
            redirect_target: constants::DEFAULT_REDIRECT.to_string(),
            probe_timeout: constants::PROBE_TIMEOUT,
            session_timeout: constants::SESSION_TIMEOUT,
            submit_timeout: constants::SUBMIT_TIMEOUT,
            verify_timeout: constants::VERIFY_TIMEOUT,
            pre_post_delay: constants::PRE_POST_DELAY,
            verify_attempts: constants::VERIFY_ATTEMPTS,
            verify_delay: constants::VERIFY_DELAY,
            min_body_len: constants::MIN_BODY_LEN,
        }
    }
}

impl AuthSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let probe_url = Url::parse(&config.probe.url)?.to_string();
        // 非 http 地址在加载时即拒绝
        ProbeRequest::from_url(&probe_url)?;
        Ok(Self {
            probe_url,
            probe_timeout: Duration::from_secs(config.probe.timeout_secs),
            session_timeout: Duration::from_secs(config.probe.session_timeout_secs),
            submit_timeout: Duration::from_secs(config.probe.submit_timeout_secs),
            verify_timeout: Duration::from_secs(config.probe.verify_timeout_secs),
            verify_attempts: config.verify.attempts.max(1),
            verify_delay: Duration::from_millis(config.verify.delay_ms),
            min_body_len: config.probe.min_body_len,
            ..Self::default()
        })
    }

    pub fn gateway_url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.gateway_host, self.gateway_port, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_portal_contract() {
        let config = AppConfig::default();
        assert!(config.auto_login);
        assert_eq!(config.network.ssid, "NKUST");
        assert_eq!(config.network.poll_interval_secs, 15);
        assert_eq!(config.verify.attempts, 3);
        assert_eq!(config.verify.delay_ms, 1000);
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_builder_and_credentials() {
        let config = AppConfig::builder()
            .credentials(
                CredentialsConfig::builder()
                    .username("C110000000".to_string())
                    .password(Secret::new("pw"))
                    .build(),
            )
            .build();
        let creds = config.credentials().expect("credentials should be complete");
        assert_eq!(creds.identifier, "C110000000");
        assert_eq!(creds.secret.expose(), "pw");
    }

    #[test]
    fn test_settings_from_config() {
        let config = AppConfig::builder()
            .verify(VerifyConfig::builder().attempts(5).delay_ms(250).build())
            .build();
        let settings = AuthSettings::from_config(&config).unwrap();
        assert_eq!(settings.verify_attempts, 5);
        assert_eq!(settings.verify_delay, Duration::from_millis(250));
        assert_eq!(settings.gateway_url("/"), "http://172.16.62.1:1000/");
        assert_eq!(settings.probe_url, "http://www.google.com/");
    }

    #[test]
    fn test_settings_reject_non_http_probe_url() {
        for url in ["https://www.google.com/", "ftp://www.google.com/"] {
            let config = AppConfig::builder()
                .probe(ProbeConfig::builder().url(url.to_string()).build())
                .build();
            assert!(matches!(
                AuthSettings::from_config(&config),
                Err(PortalError::UnsupportedUrl(_))
            ));
        }

        let config = AppConfig::builder()
            .probe(ProbeConfig::builder().url("not a url".to_string()).build())
            .build();
        assert!(matches!(AuthSettings::from_config(&config), Err(PortalError::Url(_))));
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = std::env::temp_dir().join(format!("portal-login-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            "auto_login = false\n[credentials]\nusername = \"s1\"\npassword = \"p1\"\n[network]\nbind_address = \"192.168.1.20\"\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(!config.auto_login);
        assert_eq!(config.credentials.username, "s1");
        assert_eq!(config.network.bind_address, Some("192.168.1.20".parse().unwrap()));
        assert_eq!(config.probe.min_body_len, 1000);

        std::fs::remove_dir_all(&dir).ok();
    }
}
