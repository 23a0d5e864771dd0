//! 门户协议常量 (Portal Wire Contract)
//!
//! 网关地址与表单字段属于部署常量，不随配置变化。

use std::time::Duration;

/// 门户认证网关
pub const GATEWAY_HOST: &str = "172.16.62.1";
pub const GATEWAY_PORT: u16 = 1000;

/// 外网探测目标
pub const PROBE_URL: &str = "http://www.google.com/";

/// 登录成功后门户重定向的目标 (4Tredir)
pub const DEFAULT_REDIRECT: &str = "http://www.google.com/";

/// 学号补全的邮箱域
pub const ACCOUNT_DOMAIN: &str = "nkust.edu.tw";

/// 门户 Wi-Fi 的 SSID
pub const PORTAL_SSID: &str = "NKUST";

/// 登录表单字段，顺序固定
pub const FIELD_USERNAME: &str = "username";
pub const FIELD_PASSWORD: &str = "password";
pub const FIELD_MAGIC: &str = "magic";
pub const FIELD_REDIRECT: &str = "4Tredir";

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(5);
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(3);

/// 预热会话后、提交表单前的固定等待
pub const PRE_POST_DELAY: Duration = Duration::from_millis(500);

pub const VERIFY_ATTEMPTS: u32 = 3;
pub const VERIFY_DELAY: Duration = Duration::from_secs(1);

pub const POLL_INTERVAL: Duration = Duration::from_secs(15);

/// 真实外网页面的最小长度 (经验值)
pub const MIN_BODY_LEN: usize = 1000;

/// 门户页面特征
pub const PORTAL_MARKERS: &[&str] = &["fgtauth", "fortinet", "fortigate", "window.location"];

/// 探测目标页面应包含的任一关键字
pub const PROBE_HOST_KEYWORDS: &[&str] = &["google", "search"];

/// 登录成功页面可能出现的关键字
pub const SUCCESS_KEYWORDS: &[&str] = &["success", "成功", "welcome", "歡迎", "authenticated"];

/// 被视为“门户已接受”的重定向状态码
pub const REDIRECT_STATUSES: &[u16] = &[301, 302, 303, 307, 308];
