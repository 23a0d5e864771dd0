//! magic 令牌提取 (Token Extraction)
//!
//! 按固定优先级依次尝试四种匹配方式，命中即返回。脚本跳转最具体、误报最少，排在首位。

use scraper::Html;
use strum::Display;
use tracing::debug;

use crate::core::model::AuthToken;
use crate::portal::selectors::PortalPatterns;

/// 令牌匹配方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TokenPattern {
    /// `window.location = "http://gw/fgtauth?<hex>"`
    ScriptRedirect,
    /// 正文任意位置的 `fgtauth?<hex>`
    BareReference,
    /// `<meta http-equiv="refresh" content="0;url=http://gw/fgtauth?<hex>">`
    MetaRefresh,
    /// `<a href="http://gw/fgtauth?<hex>">`
    AnchorHref,
}

impl TokenPattern {
    /// 尝试顺序
    pub const ORDER: [TokenPattern; 4] = [
        TokenPattern::ScriptRedirect,
        TokenPattern::BareReference,
        TokenPattern::MetaRefresh,
        TokenPattern::AnchorHref,
    ];

    pub fn matcher(self) -> fn(&str) -> Option<AuthToken> {
        match self {
            TokenPattern::ScriptRedirect => from_script_redirect,
            TokenPattern::BareReference => from_bare_reference,
            TokenPattern::MetaRefresh => from_meta_refresh,
            TokenPattern::AnchorHref => from_anchor_href,
        }
    }
}

/// 从门户页面中提取 magic，所有方式都失败时返回 `None`
pub fn extract_token(html: &str) -> Option<AuthToken> {
    extract_token_with_pattern(html).map(|(_, token)| token)
}

/// 同 `extract_token`，并返回命中的匹配方式
pub fn extract_token_with_pattern(html: &str) -> Option<(TokenPattern, AuthToken)> {
    if html.trim().is_empty() {
        return None;
    }

    for pattern in TokenPattern::ORDER {
        if let Some(token) = pattern.matcher()(html) {
            debug!(%pattern, %token, "Extracted magic");
            return Some((pattern, token));
        }
    }

    debug!("No magic value found in response body");
    None
}

pub fn from_script_redirect(html: &str) -> Option<AuthToken> {
    PortalPatterns::get()
        .script_redirect
        .captures(html)
        .and_then(|caps| AuthToken::parse(&caps[1]))
}

pub fn from_bare_reference(html: &str) -> Option<AuthToken> {
    PortalPatterns::get()
        .bare_reference
        .captures(html)
        .and_then(|caps| AuthToken::parse(&caps[1]))
}

pub fn from_meta_refresh(html: &str) -> Option<AuthToken> {
    let patterns = PortalPatterns::get();
    let document = Html::parse_document(html);

    document
        .select(&patterns.meta)
        .filter_map(|el| el.value().attr("content"))
        .find_map(|content| patterns.refresh_target.captures(content))
        .and_then(|caps| AuthToken::parse(&caps[1]))
}

pub fn from_anchor_href(html: &str) -> Option<AuthToken> {
    let patterns = PortalPatterns::get();
    let document = Html::parse_document(html);

    document
        .select(&patterns.href)
        .filter_map(|el| el.value().attr("href"))
        .find_map(|href| patterns.href_target.captures(href.trim()))
        .and_then(|caps| AuthToken::parse(&caps[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> Option<AuthToken> {
        AuthToken::parse(s)
    }

    #[test]
    fn test_script_redirect() {
        let html = r#"<html><script>window.location="http://172.16.62.1:1000/fgtauth?1a2b3c4d";</script></html>"#;
        assert_eq!(extract_token(html), token("1a2b3c4d"));
        assert_eq!(
            extract_token_with_pattern(html).map(|(p, _)| p),
            Some(TokenPattern::ScriptRedirect)
        );
    }

    #[test]
    fn test_script_redirect_beats_bare_reference() {
        // 正文里先出现的裸引用不应抢先于脚本跳转
        let html = r#"<p>old link fgtauth?aaaa1111</p>
<script>window.location = 'http://172.16.62.1:1000/fgtauth?bbbb2222';</script>"#;
        assert_eq!(extract_token(html), token("bbbb2222"));
        assert_eq!(from_bare_reference(html), token("aaaa1111"));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let html = r#"<script>window.location="http://gw/fgtauth?00ff"</script>"#;
        assert_eq!(extract_token(html), extract_token(html));
    }

    #[test]
    fn test_bare_reference() {
        assert_eq!(extract_token("please continue at /fgtauth?DEADbeef now"), token("DEADbeef"));
    }

    #[test]
    fn test_meta_refresh_matcher() {
        let html = r#"<html><head><meta http-equiv="refresh" content="0;url=http://172.16.62.1:1000/fgtauth?0a0b0c"></head></html>"#;
        assert_eq!(from_meta_refresh(html), token("0a0b0c"));
        assert!(from_script_redirect(html).is_none());
        assert_eq!(extract_token(html), token("0a0b0c"));
    }

    #[test]
    fn test_anchor_href_matcher() {
        let html = r#"<html><body><a href="https://172.16.62.1:1003/fgtauth?abc123">Login</a></body></html>"#;
        assert_eq!(from_anchor_href(html), token("abc123"));
        assert!(from_meta_refresh(html).is_none());
    }

    #[test]
    fn test_anchor_requires_absolute_portal_url() {
        let html = r#"<a href="/fgtauth?abc123">relative</a>"#;
        assert!(from_anchor_href(html).is_none());
    }

    #[test]
    fn test_nothing_to_extract() {
        let html = r#"<!doctype html><html><head><meta charset="utf-8"><title>Google</title></head>
<body><a href="https://www.google.com/intl/en/about">About</a></body></html>"#;
        for pattern in TokenPattern::ORDER {
            assert!(pattern.matcher()(html).is_none(), "{} matched", pattern);
        }
        assert!(extract_token(html).is_none());
        assert!(extract_token("").is_none());
    }

    #[test]
    fn test_non_hex_suffix_is_ignored() {
        assert!(extract_token("fgtauth?zzzz").is_none());
    }
}
