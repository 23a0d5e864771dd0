use crate::core::constants::ACCOUNT_DOMAIN;

pub mod wifi;

/// 补全校园账号域名；已带 `@` 的账号原样返回
pub fn format_username(identifier: &str) -> String {
    let identifier = identifier.trim();
    if identifier.contains('@') {
        identifier.to_string()
    } else {
        format!("{}@{}", identifier, ACCOUNT_DOMAIN)
    }
}

/// 日志用的正文预览，按字符截断并压成单行
pub fn preview(body: &str, max_chars: usize) -> String {
    let flat: String = body
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(max_chars)
        .collect();

    if body.chars().count() > max_chars {
        format!("{}…", flat)
    } else {
        flat
    }
}
