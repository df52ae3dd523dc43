//! 方向盘反馈帧解析
//!
//! 仅识别总线 0 上的 SAS11（转角）和 MDPS12（扭矩），其余入站帧一律丢弃。

use crate::ids::*;
use crate::{BusFrame, ProtocolError};
use bilge::prelude::*;

/// 方向盘转角传感器 (0x2B0)
#[bitsize(64)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq)]
pub struct Sas11 {
    pub angle_raw: u16,  // Bit 0-15（有符号，0.1°）
    pub speed_raw: u8,   // Bit 16-23（× 4 °/s）
    pub stat: u8,        // Bit 24-31
    pub msg_count: u4,   // Bit 32-35
    pub checksum: u4,    // Bit 36-39
    pub reserved: u24,   // Bit 40-63
}

/// 转向助力扭矩 (0x251)
#[bitsize(64)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq)]
pub struct Mdps12 {
    pub str_col_tq: u11, // Bit 0-10（× 0.0078125 - 8 Nm）
    pub reserved_a: u29, // Bit 11-39
    pub out_tq: u12,     // Bit 40-51（× 0.1 - 204.8）
    pub reserved_b: u12, // Bit 52-63
}

fn check_frame(frame: &BusFrame, address: u32, min_len: usize) -> Result<u64, ProtocolError> {
    if frame.address != address {
        return Err(ProtocolError::InvalidAddress {
            address: frame.address,
        });
    }
    if (frame.len as usize) < min_len {
        return Err(ProtocolError::InvalidLength {
            expected: min_len,
            actual: frame.len as usize,
        });
    }
    Ok(u64::from_le_bytes(frame.data))
}

/// 方向盘转角反馈
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringAngleFeedback {
    /// 转角（度）
    pub angle_deg: f64,
    /// 转角速度（°/s）
    pub rate_deg_s: f64,
    /// 报文计数
    pub msg_count: u8,
}

impl SteeringAngleFeedback {
    /// 将转角编码为 SAS11 帧（无转向硬件时由车辆状态合成）
    pub fn to_frame(&self) -> BusFrame {
        let raw = (self.angle_deg * 10.0)
            .round()
            .clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        let speed = (self.rate_deg_s.abs() / 4.0).round().clamp(0.0, 255.0) as u8;

        let mut msg = Sas11::from(0u64);
        msg.set_angle_raw(raw as u16);
        msg.set_speed_raw(speed);
        msg.set_msg_count(u4::new(self.msg_count & 0xF));

        let bytes = u64::from(msg).to_le_bytes();
        BusFrame::new(ID_SAS11, STEERING_FEEDBACK_BUS, &bytes[..5])
    }
}

impl TryFrom<BusFrame> for SteeringAngleFeedback {
    type Error = ProtocolError;

    fn try_from(frame: BusFrame) -> Result<Self, Self::Error> {
        let msg = Sas11::from(check_frame(&frame, ID_SAS11, 5)?);
        Ok(Self {
            angle_deg: msg.angle_raw() as i16 as f64 * 0.1,
            rate_deg_s: msg.speed_raw() as f64 * 4.0,
            msg_count: msg.msg_count().value(),
        })
    }
}

/// 方向盘扭矩反馈
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringTorqueFeedback {
    /// 转向柱扭矩（Nm）
    pub column_torque_nm: f64,
    /// 助力输出扭矩
    pub output_torque: f64,
}

impl TryFrom<BusFrame> for SteeringTorqueFeedback {
    type Error = ProtocolError;

    fn try_from(frame: BusFrame) -> Result<Self, Self::Error> {
        let msg = Mdps12::from(check_frame(&frame, ID_MDPS12, 7)?);
        Ok(Self {
            column_torque_nm: msg.str_col_tq().value() as f64 * 0.0078125 - 8.0,
            output_torque: msg.out_tq().value() as f64 * 0.1 - 204.8,
        })
    }
}

/// 入站帧分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteeringFrameKind {
    Angle,
    Torque,
}

/// 判断入站帧是否为方向盘反馈
pub fn classify_steering_frame(frame: &BusFrame) -> Option<SteeringFrameKind> {
    if frame.matches(ID_SAS11, STEERING_FEEDBACK_BUS) {
        Some(SteeringFrameKind::Angle)
    } else if frame.matches(ID_MDPS12, STEERING_FEEDBACK_BUS) {
        Some(SteeringFrameKind::Torque)
    } else {
        None
    }
}
