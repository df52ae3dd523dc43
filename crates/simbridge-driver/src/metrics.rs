//! 桥接器运行指标
//!
//! 原子计数器，任意线程可读，无锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 运行指标
///
/// ```rust
/// use simbridge_driver::BridgeMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = BridgeMetrics::new();
/// metrics.frames_sent.fetch_add(4, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().frames_sent, 4);
/// ```
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    /// 控制循环周期数
    pub ticks: AtomicU64,
    /// 超过延迟阈值的周期数
    pub lagged_ticks: AtomicU64,
    /// 已处理的手动命令数
    pub commands_processed: AtomicU64,
    /// 发往硬件的总帧数
    pub frames_sent: AtomicU64,
    /// 发送失败次数
    pub send_errors: AtomicU64,
    /// 从硬件收到的总帧数
    pub frames_received: AtomicU64,
    /// 其中的方向盘反馈帧数
    pub steering_feedback_frames: AtomicU64,
    /// 发布给驾驶栈的车辆状态批次数
    pub carstate_batches: AtomicU64,
    /// 发布的遥测记录数
    pub telemetry_published: AtomicU64,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            lagged_ticks: self.lagged_ticks.load(Ordering::Relaxed),
            commands_processed: self.commands_processed.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            steering_feedback_frames: self.steering_feedback_frames.load(Ordering::Relaxed),
            carstate_batches: self.carstate_batches.load(Ordering::Relaxed),
            telemetry_published: self.telemetry_published.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub lagged_ticks: u64,
    pub commands_processed: u64,
    pub frames_sent: u64,
    pub send_errors: u64,
    pub frames_received: u64,
    pub steering_feedback_frames: u64,
    pub carstate_batches: u64,
    pub telemetry_published: u64,
}

impl MetricsSnapshot {
    /// 延迟周期占比（百分比），无周期时为 0
    pub fn lag_rate(&self) -> f64 {
        if self.ticks == 0 {
            return 0.0;
        }
        self.lagged_ticks as f64 / self.ticks as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_snapshot_default_zero() {
        assert_eq!(BridgeMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_concurrent_increments() {
        let metrics = Arc::new(BridgeMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        m.frames_received.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(metrics.snapshot().frames_received, 4000);
    }

    #[test]
    fn test_lag_rate() {
        let snap = MetricsSnapshot {
            ticks: 200,
            lagged_ticks: 5,
            ..Default::default()
        };
        assert!((snap.lag_rate() - 2.5).abs() < 1e-9);
        assert_eq!(MetricsSnapshot::default().lag_rate(), 0.0);
    }
}
