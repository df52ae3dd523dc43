//! 滚动计数器（alive counter）
//!
//! 计数值始终由帧序号推导：`value = tick % modulus`，不保存可变状态，
//! 因此重启会话后计数序列从 0 重新开始。

/// 固定位宽的滚动计数器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingCounter {
    bits: u32,
}

impl RollingCounter {
    /// EMS16 AliveCounter（2 bit）
    pub const ENGINE_STATUS: Self = Self::new(2);

    /// CLU11 AliveCnt1 / 车辆状态帧计数（4 bit）
    pub const CLUSTER: Self = Self::new(4);

    /// 创建指定位宽的计数器（1..=8）
    pub const fn new(bits: u32) -> Self {
        assert!(bits >= 1 && bits <= 8);
        Self { bits }
    }

    /// 模数
    #[inline]
    pub const fn modulus(&self) -> u64 {
        1 << self.bits
    }

    /// 第 `tick` 帧的计数值
    #[inline]
    pub const fn at(&self, tick: u64) -> u8 {
        (tick % self.modulus()) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_status_counter_cycles() {
        let seq: Vec<u8> = (0..9).map(|i| RollingCounter::ENGINE_STATUS.at(i)).collect();
        assert_eq!(seq, vec![0, 1, 2, 3, 0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_cluster_counter_wraps_at_16() {
        for i in 0..16u64 {
            assert_eq!(RollingCounter::CLUSTER.at(i), i as u8);
        }
        assert_eq!(RollingCounter::CLUSTER.at(16), 0);
        assert_eq!(RollingCounter::CLUSTER.at(17), 1);
    }

    #[test]
    fn test_modulus() {
        assert_eq!(RollingCounter::ENGINE_STATUS.modulus(), 4);
        assert_eq!(RollingCounter::CLUSTER.modulus(), 16);
        assert_eq!(RollingCounter::new(8).modulus(), 256);
    }
}
