//! 出站周期帧合成
//!
//! 以 100Hz 基础节拍为参考：
//!
//! | 帧 | 周期 | 字段 |
//! |----|------|------|
//! | EMS16 | 每拍 | `ENG_STAT`, `AliveCounter = tick % 4`, `Checksum` |
//! | EMS_366 | 每拍 | `VS`（km/h） |
//! | CLU11 | 偶数拍（50Hz） | `CF_Clu_Vanz`, `CF_Clu_AliveCnt1 = half_tick % 16` |
//! | P_STS | 偶数拍（50Hz） | `Counter`, `Checksum` |
//!
//! 合成只依赖帧序号和车速，与驾驶栈状态无关。

use crate::checksum::{nibble_sum_checksum, position_status_checksum};
use crate::counter::RollingCounter;
use crate::ids::*;
use crate::{BusFrame, CruiseButton, FrameBatch};
use bilge::prelude::*;

/// m/s 转 km/h
#[inline]
pub fn speed_kph(speed_mps: f64) -> f64 {
    speed_mps * 3.6
}

// ============================================================================
// 位域布局
// ============================================================================

/// 发动机状态 (0x260)
#[bitsize(64)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq)]
pub struct Ems16 {
    pub tqi_min: u8,         // Bit 0-7
    pub tqi: u8,             // Bit 8-15
    pub tqi_target: u8,      // Bit 16-23
    pub glow_stat: bool,     // Bit 24
    pub cruise_lamp_m: bool, // Bit 25
    pub cruise_lamp_s: bool, // Bit 26
    pub pre_fuel_cut_in: bool, // Bit 27
    pub eng_stat: u3,        // Bit 28-30
    pub soak_time_err: bool, // Bit 31
    pub soak_time: u8,       // Bit 32-39
    pub tqi_max: u8,         // Bit 40-47
    pub spk_time_cur: u8,    // Bit 48-55
    pub checksum: u4,        // Bit 56-59
    pub alive_counter: u2,   // Bit 60-61
    pub acl_act: u2,         // Bit 62-63
}

/// 发动机车速 (0x366)
#[bitsize(64)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq)]
pub struct Ems366 {
    pub tqi_1: u8,       // Bit 0-7
    pub n: u16,          // Bit 8-23（rpm × 4）
    pub tqi_2: u8,       // Bit 24-31
    pub reserved_a: u8,  // Bit 32-39
    pub vs: u8,          // Bit 40-47（km/h）
    pub reserved_b: u16, // Bit 48-63
}

/// 仪表盘 (0x4F1)
#[bitsize(32)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq)]
pub struct Clu11 {
    pub cruise_sw_state: u3,  // Bit 0-2
    pub cruise_sw_main: bool, // Bit 3
    pub sld_main_sw: bool,    // Bit 4
    pub parity_bit1: bool,    // Bit 5
    pub vanz_decimal: u2,     // Bit 6-7
    pub vanz: u9,             // Bit 8-16（× 0.5 km/h）
    pub speed_unit: bool,     // Bit 17
    pub detent_out: bool,     // Bit 18
    pub rheostat_level: u5,   // Bit 19-23
    pub clu_info: bool,       // Bit 24
    pub amp_info: bool,       // Bit 25
    pub reserved: u2,         // Bit 26-27
    pub alive_cnt1: u4,       // Bit 28-31
}

/// 挡位/位置状态 (0x470)，6 字节有效
#[bitsize(64)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq)]
pub struct PositionStatus {
    pub reserved_a: u32, // Bit 0-31
    pub counter: u4,     // Bit 32-35
    pub reserved_b: u2,  // Bit 36-37
    pub checksum: u2,    // Bit 38-39
    pub reserved_c: u24, // Bit 40-63
}

// ============================================================================
// 单帧构建
// ============================================================================

/// EMS16：先编码除校验外的全部字段，再对该载荷计算校验并写回
pub fn engine_status(tick: u64, status: u8) -> BusFrame {
    let mut msg = Ems16::from(0u64);
    msg.set_eng_stat(u3::new(status & 0b111));
    msg.set_alive_counter(u2::new(RollingCounter::ENGINE_STATUS.at(tick)));

    let unchecked = u64::from(msg).to_le_bytes();
    msg.set_checksum(u4::new(nibble_sum_checksum(&unchecked)));

    BusFrame::new(ID_EMS16, 0, &u64::from(msg).to_le_bytes())
}

/// EMS_366：车速（km/h，四舍五入，饱和到 0-255）
pub fn engine_speed(speed_kph: f64) -> BusFrame {
    let mut msg = Ems366::from(0u64);
    msg.set_vs(speed_kph.round().clamp(0.0, u8::MAX as f64) as u8);
    BusFrame::new(ID_EMS366, 0, &u64::from(msg).to_le_bytes())
}

/// CLU11：仪表车速 + 巡航按键 + 4 bit 计数
pub fn cluster(counter: u64, speed_kph: f64, button: CruiseButton) -> BusFrame {
    let vanz = (speed_kph / 0.5).round().clamp(0.0, 511.0) as u16;

    let mut msg = Clu11::from(0u32);
    msg.set_cruise_sw_state(u3::new(u8::from(button) & 0b111));
    msg.set_vanz(u9::new(vanz));
    msg.set_alive_cnt1(u4::new(RollingCounter::CLUSTER.at(counter)));

    BusFrame::new(ID_CLU11, 0, &u32::from(msg).to_le_bytes())
}

/// P_STS：计数取低 4 bit，校验使用原始计数值
pub fn position_status(counter: u64) -> BusFrame {
    let mut msg = PositionStatus::from(0u64);
    msg.set_counter(u4::new((counter & 0xF) as u8));
    msg.set_checksum(u2::new(position_status_checksum(counter)));

    let bytes = u64::from(msg).to_le_bytes();
    BusFrame::new(ID_P_STS, 0, &bytes[..6])
}

// ============================================================================
// 周期合成
// ============================================================================

/// 周期帧合成器
///
/// 无内部状态，计数全部由调用方传入的帧序号推导。
#[derive(Debug, Clone, Copy)]
pub struct FrameSynthesizer {
    /// EMS16 `ENG_STAT`（3 = 运行中）
    pub engine_status: u8,
}

impl Default for FrameSynthesizer {
    fn default() -> Self {
        Self { engine_status: 3 }
    }
}

impl FrameSynthesizer {
    pub fn new(engine_status: u8) -> Self {
        Self { engine_status }
    }

    /// 合成第 `tick` 拍的周期帧，追加到 `batch`
    pub fn synthesize_into(&self, tick: u64, speed_mps: f64, batch: &mut FrameBatch) {
        let kph = speed_kph(speed_mps);

        batch.push(engine_status(tick, self.engine_status));
        batch.push(engine_speed(kph));

        if tick % 2 == 0 {
            let half_tick = tick / 2;
            batch.push(cluster(half_tick, kph, CruiseButton::None));
            batch.push(position_status(half_tick));
        }
    }

    /// 合成第 `tick` 拍的周期帧
    pub fn synthesize(&self, tick: u64, speed_mps: f64) -> FrameBatch {
        let mut batch = FrameBatch::new();
        self.synthesize_into(tick, speed_mps, &mut batch);
        batch
    }
}
