//! 取消令牌
//!
//! 所有后台线程共享同一个运行标志，每个周期检查一次。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 会话级取消信号
///
/// 克隆共享同一标志。一旦取消不可恢复，下一次会话使用新的令牌。
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 通知所有持有者退出
    pub fn cancel(&self) {
        // Release: 取消之前的写入对观察到取消的线程可见
        self.cancelled.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_cancel_visible_across_clones() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());

        thread::spawn(move || token.cancel()).join().unwrap();
        assert!(observer.is_cancelled());
    }
}
