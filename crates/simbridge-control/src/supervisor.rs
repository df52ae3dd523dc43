//! 会话重启策略
//!
//! 可恢复错误（连接中断、设备暂时不可用）重建整个会话，指数退避，
//! 次数有上限；不可恢复错误（配置、出生点越界）立即返回。

use crate::error::BridgeError;
use crate::session::SessionSummary;
use std::thread;
use std::time::Duration;
use tracing::{error, warn};

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数（含第一次）
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次失败后的等待时间（从 1 开始），每次翻倍，不超过上限
    ///
    /// ```
    /// use simbridge_control::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.backoff(1), Duration::from_millis(500));
    /// assert_eq!(policy.backoff(3), Duration::from_secs(2));
    /// assert_eq!(policy.backoff(10), Duration::from_secs(8));
    /// ```
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .checked_mul(1u32 << shift)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// 运行会话，可恢复错误时按策略重建
///
/// `run` 的参数为尝试序号（从 1 开始）。
pub fn run_with_restarts<F>(policy: RetryPolicy, mut run: F) -> Result<SessionSummary, BridgeError>
where
    F: FnMut(u32) -> Result<SessionSummary, BridgeError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match run(attempt) {
            Ok(summary) => return Ok(summary),
            Err(e) if !e.is_transient() => {
                error!("Bridge failed with unrecoverable error: {}", e);
                return Err(e);
            },
            Err(e) if attempt >= max_attempts => {
                error!("Bridge failed {} times, giving up", attempt);
                return Err(BridgeError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(e),
                });
            },
            Err(e) => {
                let wait = policy.backoff(attempt);
                warn!(
                    "Restarting bridge... (attempt {}/{} failed: {}, retrying in {:?})",
                    attempt, max_attempts, e, wait
                );
                thread::sleep(wait);
                attempt += 1;
            },
        }
    }
}
