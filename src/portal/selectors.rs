//! 门户页面选择器
//!
//! 预编译的正则与 CSS 选择器

use std::sync::OnceLock;

use regex::Regex;
use scraper::Selector;

/// 门户协议解析所需的模式集合
pub struct PortalPatterns {
    /// `window.location="http://.../fgtauth?<hex>"`
    pub script_redirect: Regex,
    /// 任意位置的 `fgtauth?<hex>`
    pub bare_reference: Regex,
    /// meta refresh 的 content 值中的跳转目标
    pub refresh_target: Regex,
    /// href 值本身就是门户地址
    pub href_target: Regex,
    /// `HTTP/1.1 302 Found`
    pub status_line: Regex,
    /// curl -v 的 `< HTTP/1.1 302 Found`
    pub trace_status_line: Regex,
    /// curl -w 输出的 `HTTP_CODE:302`
    pub write_out_code: Regex,
    /// `Name: value`
    pub header_line: Regex,
    pub meta: Selector,
    pub href: Selector,
}

static PATTERNS: OnceLock<PortalPatterns> = OnceLock::new();

impl PortalPatterns {
    /// 获取全局模式实例
    pub fn get() -> &'static PortalPatterns {
        PATTERNS.get_or_init(|| PortalPatterns {
            script_redirect: Regex::new(
                r#"(?i)window\.location\s*=\s*["']https?://[^"']*/fgtauth\?([0-9a-f]+)["']"#,
            )
            .unwrap(),
            bare_reference: Regex::new(r"(?i)fgtauth\?([0-9a-f]+)").unwrap(),
            refresh_target: Regex::new(r#"(?i)url\s*=\s*[^"']*/fgtauth\?([0-9a-f]+)"#).unwrap(),
            href_target: Regex::new(r#"(?i)^https?://[^"']*/fgtauth\?([0-9a-f]+)$"#).unwrap(),
            status_line: Regex::new(r"^HTTP/[\d.]+\s+(\d+)").unwrap(),
            trace_status_line: Regex::new(r"< HTTP/[\d.]+\s+(\d+)").unwrap(),
            write_out_code: Regex::new(r"HTTP_CODE:(\d+)").unwrap(),
            header_line: Regex::new(r"^([^:\s][^:]*):\s*(.+)$").unwrap(),
            meta: Selector::parse("meta[content]").unwrap(),
            href: Selector::parse("[href]").unwrap(),
        })
    }
}
