use async_trait::async_trait;

/// 当前 Wi-Fi 名称来源
///
/// 取不到时返回 `None`，不视为错误。
#[async_trait]
pub trait SsidSource: Send + Sync {
    async fn current_ssid(&self) -> Option<String>;
}
