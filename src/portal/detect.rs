//! 连通性判定策略 (Connectivity Heuristics)
//!
//! 基于页面内容的近似判断：没有门户特征、像探测目标的真实页面、且长度足够。
//! 阈值是经验值，作为可调策略而不是硬约束。

use tracing::debug;

use crate::core::constants::{MIN_BODY_LEN, PORTAL_MARKERS, PROBE_HOST_KEYWORDS};
use crate::core::model::ConnectivityVerdict;

/// 门户页面识别策略
#[derive(Debug, Clone)]
pub struct ConnectivityPolicy {
    /// 真实页面的最小字符数 (含)
    pub min_body_len: usize,
    pub portal_markers: Vec<String>,
    pub host_keywords: Vec<String>,
}

impl Default for ConnectivityPolicy {
    fn default() -> Self {
        Self {
            min_body_len: MIN_BODY_LEN,
            portal_markers: PORTAL_MARKERS.iter().map(|s| s.to_string()).collect(),
            host_keywords: PROBE_HOST_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ConnectivityPolicy {
    pub fn with_min_body_len(min_body_len: usize) -> Self {
        Self {
            min_body_len,
            ..Self::default()
        }
    }

    /// 命中的第一个门户特征
    pub fn portal_marker(&self, body: &str) -> Option<&str> {
        let lower = body.to_lowercase();
        self.portal_markers
            .iter()
            .find(|m| lower.contains(m.as_str()))
            .map(String::as_str)
    }

    fn looks_like_probe_target(&self, lower: &str) -> bool {
        let is_document = lower.contains("<!doctype html") || lower.contains("<html");
        is_document && self.host_keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    pub fn classify(&self, body: &str, status_code: u16) -> ConnectivityVerdict {
        if status_code == 0 && body.trim().is_empty() {
            return ConnectivityVerdict::Indeterminate("empty response".into());
        }

        if let Some(marker) = self.portal_marker(body) {
            debug!(marker, status_code, "Detected portal content in response");
            return ConnectivityVerdict::NotConnected;
        }

        let lower = body.to_lowercase();
        let length = body.chars().count();
        if self.looks_like_probe_target(&lower) && length >= self.min_body_len {
            debug!(length, status_code, "Response looks like the real probe target");
            ConnectivityVerdict::Connected
        } else {
            ConnectivityVerdict::NotConnected
        }
    }
}
