//! 有界重试组合子 (Bounded Retry Combinator)
//!
//! 第 1 次立即执行，之后每次先等待固定间隔；谓词首次为真即返回。
//! 与网络无关，可单独测试。

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// 重试参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数 (含首次)，至少为 1
    pub attempts: u32,
    /// 相邻两次尝试之间的等待
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

/// 重试结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// 第 `attempt` 次尝试满足谓词
    Satisfied { attempt: u32 },
    Exhausted,
    Cancelled,
}

/// 执行 `retry(attempts, delay, predicate)`
///
/// 谓词收到从 1 开始的尝试序号。取消令牌在等待期间及每次尝试前后检查。
pub async fn retry<F, Fut>(policy: RetryPolicy, shutdown: &CancellationToken, mut predicate: F) -> RetryOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 1..=policy.attempts.max(1) {
        if attempt > 1 {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return RetryOutcome::Cancelled,
                _ = tokio::time::sleep(policy.delay) => {}
            }
        }

        if shutdown.is_cancelled() {
            return RetryOutcome::Cancelled;
        }

        if predicate(attempt).await {
            return RetryOutcome::Satisfied { attempt };
        }
    }

    if shutdown.is_cancelled() {
        RetryOutcome::Cancelled
    } else {
        RetryOutcome::Exhausted
    }
}
