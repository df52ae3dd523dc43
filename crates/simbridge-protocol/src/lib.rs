//! # Simbridge Protocol
//!
//! 车辆总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: 报文地址常量
//! - `checksum`: 半字节求和校验 / 位置状态校验
//! - `counter`: 滚动计数器（alive counter）
//! - `outbound`: 发往硬件的周期帧合成（EMS16 / EMS_366 / CLU11 / P_STS）
//! - `feedback`: 方向盘反馈帧解析（SAS11 / MDPS12）
//! - `carstate`: 发往驾驶栈的车辆状态帧
//!
//! ## 位序
//!
//! 所有帧布局均为 Intel（小端）字节序、LSB first 位序，
//! 与 bilge 默认位序一致，编码时使用 `to_le_bytes()`。

pub mod carstate;
pub mod checksum;
pub mod counter;
pub mod feedback;
pub mod ids;
pub mod outbound;

pub use checksum::{nibble_sum_checksum, position_status_checksum};
pub use counter::RollingCounter;
pub use feedback::{SteeringAngleFeedback, SteeringTorqueFeedback};
pub use ids::*;
pub use outbound::{FrameSynthesizer, speed_kph};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use smallvec::SmallVec;
use std::fmt;
use thiserror::Error;

/// 车辆总线帧
///
/// 协议层与硬件层之间的中间抽象，对应 (address, bus, payload, source) 四元组。
///
/// - `bus`: 帧所在的物理总线编号（硬件后端据此选择接口）
/// - `src`: 来源标记，驾驶栈发出的帧原样保留
///
/// 固定 8 字节数据区，`len` 为有效长度。`Copy` 语义，适合 100Hz 批量收发。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusFrame {
    /// 报文地址（11-bit 标准帧 ID）
    pub address: u32,
    /// 总线编号
    pub bus: u8,
    /// 帧数据（未使用部分为 0）
    pub data: [u8; 8],
    /// 有效数据长度 (0-8)
    pub len: u8,
    /// 来源标记
    pub src: u8,
}

impl BusFrame {
    /// 创建帧，数据超过 8 字节的部分被截断
    pub fn new(address: u32, bus: u8, data: &[u8]) -> Self {
        let mut fixed = [0u8; 8];
        let len = data.len().min(8);
        fixed[..len].copy_from_slice(&data[..len]);

        Self {
            address,
            bus,
            data: fixed,
            len: len as u8,
            src: bus,
        }
    }

    /// 设置来源标记
    pub fn with_src(mut self, src: u8) -> Self {
        self.src = src;
        self
    }

    /// 有效数据切片
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 是否为指定总线上的指定地址
    #[inline]
    pub fn matches(&self, address: u32, bus: u8) -> bool {
        self.address == address && self.bus == bus
    }
}

impl fmt::Display for BusFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:03X}@{} [{}] {}",
            self.address,
            self.bus,
            self.len,
            hex::encode(self.data_slice())
        )
    }
}

/// 单个周期的出站帧批次
///
/// 每个周期合成 2~4 帧，再追加驾驶栈的帧，16 个槽位覆盖常见情况而不分配堆内存。
pub type FrameBatch = SmallVec<[BusFrame; 16]>;

/// 巡航按键码
///
/// 在一个控制周期内有效（脉冲语义），无命令的周期回到 `None`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CruiseButton {
    #[default]
    None = 0,
    ResAccel = 1,
    SetDecel = 2,
    GapDist = 3,
    Cancel = 4,
}

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid address: 0x{address:X}")]
    InvalidAddress { address: u32 },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_frame_truncates_long_payload() {
        let frame = BusFrame::new(0x123, 0, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(frame.len, 8);
        assert_eq!(frame.data_slice(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_bus_frame_short_payload_zero_padded() {
        let frame = BusFrame::new(0x4F1, 1, &[0xAA, 0xBB]);
        assert_eq!(frame.data, [0xAA, 0xBB, 0, 0, 0, 0, 0, 0]);
        assert_eq!(frame.data_slice(), &[0xAA, 0xBB]);
        assert_eq!(frame.src, 1);
    }

    #[test]
    fn test_bus_frame_matches() {
        let frame = BusFrame::new(688, 0, &[0; 5]);
        assert!(frame.matches(688, 0));
        assert!(!frame.matches(688, 1));
        assert!(!frame.matches(593, 0));
    }

    #[test]
    fn test_bus_frame_display() {
        let frame = BusFrame::new(0x260, 0, &[0x00, 0x1C]);
        assert_eq!(frame.to_string(), "0x260@0 [2] 001c");
    }

    #[test]
    fn test_cruise_button_codes() {
        assert_eq!(u8::from(CruiseButton::None), 0);
        assert_eq!(u8::from(CruiseButton::SetDecel), 2);
        assert_eq!(CruiseButton::try_from(4u8).unwrap(), CruiseButton::Cancel);
        assert!(CruiseButton::try_from(9u8).is_err());
    }
}
