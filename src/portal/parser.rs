//! 原始响应解析 (Raw Response Parsing)
//!
//! 输入是 `curl -i` 风格的原始报文，可选附带 `curl -v` 的详细日志。
//! 门户中间盒的响应常常不规范，所有函数在畸形输入上都返回空值而不报错。

use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::core::constants::{REDIRECT_STATUSES, SUCCESS_KEYWORDS};
use crate::core::model::ProbeResult;
use crate::portal::selectors::PortalPatterns;

/// 分离响应头与响应体
///
/// 以第一处“前一行像头部或状态行”的空行为界；找不到时，
/// 若最后一行非空内容像 HTML 或带门户跳转标记则返回它，否则返回空串。
pub fn extract_body(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let lines: Vec<&str> = raw.split('\n').collect();
    let start = (1..lines.len())
        .find(|&i| lines[i].trim().is_empty() && looks_like_head(lines[i - 1]))
        .map(|i| i + 1);

    match start {
        Some(start) if start < lines.len() => lines[start..].join("\n").trim().to_string(),
        _ => {
            let last = lines
                .iter()
                .rev()
                .map(|l| l.trim())
                .find(|l| !l.is_empty())
                .unwrap_or("");
            let lower = last.to_ascii_lowercase();
            if lower.starts_with("<html") || lower.starts_with("<!doctype") || lower.contains("fgtauth") {
                last.to_string()
            } else {
                String::new()
            }
        }
    }
}

fn looks_like_head(line: &str) -> bool {
    line.contains(':') || line.trim_start().starts_with("HTTP/")
}

/// 提取状态码：响应头中的状态行优先，其次是详细日志，都没有时为 0
pub fn extract_status_code(raw: &str, trace: Option<&str>) -> u16 {
    let code = status_from_headers(raw);
    if code != 0 {
        return code;
    }
    trace.map(status_from_trace).unwrap_or(0)
}

/// 第一处状态行中的状态码
pub fn status_from_headers(raw: &str) -> u16 {
    let patterns = PortalPatterns::get();
    raw.lines()
        .find_map(|line| patterns.status_line.captures(line.trim_start()))
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

/// `curl -v` 日志中的状态码
pub fn status_from_trace(trace: &str) -> u16 {
    PortalPatterns::get()
        .trace_status_line
        .captures(trace)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

/// `curl -w "HTTP_CODE:%{http_code}"` 追加的状态码
pub fn status_from_write_out(raw: &str) -> u16 {
    PortalPatterns::get()
        .write_out_code
        .captures(raw)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

/// 解析头部区域，名称统一小写，后出现的同名头覆盖前者
pub fn parse_headers(raw: &str) -> IndexMap<String, String> {
    let patterns = PortalPatterns::get();
    let mut headers = IndexMap::new();

    for line in raw.lines().map(str::trim_end) {
        if line.is_empty() {
            if headers.is_empty() {
                continue;
            }
            break;
        }
        if line.starts_with("HTTP/") {
            continue;
        }
        if let Some(caps) = patterns.header_line.captures(line) {
            headers.insert(caps[1].trim().to_ascii_lowercase(), caps[2].trim().to_string());
        }
    }

    headers
}

/// 将原始报文还原为 `ProbeResult`
pub fn parse_transcript(raw: &str, trace: Option<&str>) -> ProbeResult {
    let cleaned = PortalPatterns::get().write_out_code.replace(raw, "");

    let mut status = extract_status_code(&cleaned, trace);
    if status == 0 {
        status = status_from_write_out(raw);
    }

    let headers: HeaderMap = parse_headers(&cleaned)
        .into_iter()
        .filter_map(|(k, v)| {
            let name = HeaderName::from_bytes(k.as_bytes()).ok()?;
            let value = HeaderValue::from_str(&v).ok()?;
            Some((name, value))
        })
        .collect();

    ProbeResult::new(status, headers, extract_body(&cleaned))
}

pub fn is_redirect(status: u16) -> bool {
    REDIRECT_STATUSES.contains(&status)
}

pub fn is_ok(status: u16) -> bool {
    status == 200
}

/// 门户接受登录请求的状态码
pub fn is_accepted(status: u16) -> bool {
    is_ok(status) || is_redirect(status)
}

/// 响应体是否包含成功关键字 (大小写不敏感)
pub fn contains_success_keyword(body: &str) -> bool {
    let lower = body.to_lowercase();
    SUCCESS_KEYWORDS.iter().any(|k| lower.contains(k))
}
