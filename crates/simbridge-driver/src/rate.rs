//! 固定频率节拍器
//!
//! 每次 `keep_time` 把下一拍的截止时间推后一个周期，并睡到截止时间。
//! 超时的周期不跳拍：截止时间仍按固定步长推进，后续周期少睡或不睡以追赶。

use spin_sleep::SpinSleeper;
use std::time::{Duration, Instant};
use tracing::warn;

/// 固定频率节拍器
#[derive(Debug)]
pub struct RateKeeper {
    name: &'static str,
    interval: Duration,
    next_frame: Instant,
    frame: u64,
    /// 最近一拍距截止时间的余量（秒），负数表示滞后
    remaining: f64,
    print_delay_threshold: Option<Duration>,
    sleeper: SpinSleeper,
}

impl RateKeeper {
    /// `rate_hz` 必须为正
    pub fn new(name: &'static str, rate_hz: f64, print_delay_threshold: Option<Duration>) -> Self {
        let interval = Duration::from_secs_f64(1.0 / rate_hz.max(f64::MIN_POSITIVE));
        Self {
            name,
            interval,
            next_frame: Instant::now() + interval,
            frame: 0,
            remaining: 0.0,
            print_delay_threshold,
            sleeper: SpinSleeper::default(),
        }
    }

    /// 已完成的拍数
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 最近一拍的余量（秒）
    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    /// 记录本拍耗时并推进截止时间，返回是否滞后超过阈值
    pub fn monitor_time(&mut self) -> bool {
        let now = Instant::now();
        let remaining = if self.next_frame >= now {
            (self.next_frame - now).as_secs_f64()
        } else {
            -(now - self.next_frame).as_secs_f64()
        };
        self.next_frame += self.interval;

        let mut lagged = false;
        if let Some(threshold) = self.print_delay_threshold
            && remaining < -threshold.as_secs_f64()
        {
            warn!("{} lagging by {:.2} ms", self.name, -remaining * 1000.0);
            lagged = true;
        }

        self.frame += 1;
        self.remaining = remaining;
        lagged
    }

    /// 睡到下一拍，返回本拍是否滞后
    pub fn keep_time(&mut self) -> bool {
        let lagged = self.monitor_time();
        if self.remaining > 0.0 {
            self.sleeper.sleep(Duration::from_secs_f64(self.remaining));
        }
        lagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_frame_counts_ticks() {
        let mut rk = RateKeeper::new("test", 1000.0, None);
        for _ in 0..5 {
            rk.keep_time();
        }
        assert_eq!(rk.frame(), 5);
        assert_eq!(rk.interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_holds_rate() {
        let mut rk = RateKeeper::new("test", 200.0, None);
        let start = Instant::now();
        for _ in 0..10 {
            rk.keep_time();
        }
        // 10 拍 × 5ms
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn test_overrun_reports_lag_and_catches_up() {
        let mut rk = RateKeeper::new("test", 100.0, Some(Duration::from_millis(5)));
        thread::sleep(Duration::from_millis(40));
        assert!(rk.keep_time());
        assert!(rk.remaining() < 0.0);

        // 截止时间按固定步长推进：紧随其后的一拍仍然滞后，不会睡眠
        let before = Instant::now();
        rk.keep_time();
        assert!(before.elapsed() < Duration::from_millis(10));
    }
}
