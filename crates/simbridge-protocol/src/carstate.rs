//! 车辆状态帧（桥接器 → 驾驶栈）
//!
//! 驾驶栈通过这些帧感知车速、巡航按键、转向灯和方向盘角度。
//! 有真实方向盘硬件时，SAS11/MDPS12 原样转发；否则由车辆状态合成 SAS11。

use crate::counter::RollingCounter;
use crate::feedback::SteeringAngleFeedback;
use crate::ids::*;
use crate::outbound::{cluster, speed_kph};
use crate::{BusFrame, CruiseButton, FrameBatch};
use bilge::prelude::*;

/// 轮速 (0x386)
#[bitsize(64)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq)]
pub struct WheelSpeeds {
    pub fl: u14,           // Bit 0-13（× 0.03125 km/h）
    pub alive_lsb: u2,     // Bit 14-15
    pub fr: u14,           // Bit 16-29
    pub alive_msb: u2,     // Bit 30-31
    pub rl: u14,           // Bit 32-45
    pub checksum_lsb: u2,  // Bit 46-47
    pub rr: u14,           // Bit 48-61
    pub checksum_msb: u2,  // Bit 62-63
}

/// 网关灯光 (0x541)
#[bitsize(64)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq)]
pub struct Cgw1 {
    pub reserved_a: u19,    // Bit 0-18
    pub turn_sig_lh: bool,  // Bit 19
    pub reserved_b: u42,    // Bit 20-61
    pub turn_sig_rh: bool,  // Bit 62
    pub reserved_c: bool,   // Bit 63
}

/// 巡航主开关 (0x420)
#[bitsize(64)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq)]
pub struct Scc11 {
    pub main_mode_acc: bool, // Bit 0
    pub reserved_a: u11,     // Bit 1-11
    pub alive_counter: u4,   // Bit 12-15
    pub reserved_b: u48,     // Bit 16-63
}

/// 巡航控制状态 (0x421)
#[bitsize(64)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq)]
pub struct Scc12 {
    pub reserved_a: u7,  // Bit 0-6
    pub acc_mode: u2,    // Bit 7-8
    pub reserved_b: u39, // Bit 9-47
    pub vsm_alive: u4,   // Bit 48-51
    pub reserved_c: u12, // Bit 52-63
}

/// 轮速帧，四轮同速，4 bit 计数拆分到 LSB/MSB 两段
pub fn wheel_speeds(tick: u64, speed_kph: f64) -> BusFrame {
    let raw = u14::new((speed_kph / 0.03125).round().clamp(0.0, 16383.0) as u16);
    let alive = RollingCounter::CLUSTER.at(tick);

    let mut msg = WheelSpeeds::from(0u64);
    msg.set_fl(raw);
    msg.set_fr(raw);
    msg.set_rl(raw);
    msg.set_rr(raw);
    msg.set_alive_lsb(u2::new(alive & 0b11));
    msg.set_alive_msb(u2::new(alive >> 2));

    BusFrame::new(ID_WHL_SPD11, 0, &u64::from(msg).to_le_bytes())
}

/// 转向灯
pub fn gateway_lamps(left: bool, right: bool) -> BusFrame {
    let mut msg = Cgw1::from(0u64);
    msg.set_turn_sig_lh(left);
    msg.set_turn_sig_rh(right);
    BusFrame::new(ID_CGW1, 0, &u64::from(msg).to_le_bytes())
}

/// 巡航主开关
pub fn cruise_main(tick: u64, main_on: bool) -> BusFrame {
    let mut msg = Scc11::from(0u64);
    msg.set_main_mode_acc(main_on);
    msg.set_alive_counter(u4::new(RollingCounter::CLUSTER.at(tick)));
    BusFrame::new(ID_SCC11, 0, &u64::from(msg).to_le_bytes())
}

/// 巡航控制状态，接管时 ACCMode = 1
pub fn cruise_control(tick: u64, engaged: bool) -> BusFrame {
    let mut msg = Scc12::from(0u64);
    msg.set_acc_mode(u2::new(engaged as u8));
    msg.set_vsm_alive(u4::new(RollingCounter::CLUSTER.at(tick)));
    BusFrame::new(ID_SCC12, 0, &u64::from(msg).to_le_bytes())
}

/// 车辆状态帧的输入快照
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CarStateInputs {
    pub speed_mps: f64,
    /// 方向盘角度（度），无硬件反馈时用于合成 SAS11
    pub steering_angle_deg: f64,
    pub cruise_button: CruiseButton,
    pub engaged: bool,
    pub blinker_left: bool,
    pub blinker_right: bool,
    /// 最近一次硬件转角帧
    pub wheel_angle_frame: Option<BusFrame>,
    /// 最近一次硬件扭矩帧
    pub wheel_torque_frame: Option<BusFrame>,
}

/// 合成第 `tick` 拍的车辆状态帧，追加到 `batch`
pub fn encode_car_state(tick: u64, inputs: &CarStateInputs, batch: &mut FrameBatch) {
    let kph = speed_kph(inputs.speed_mps);

    batch.push(wheel_speeds(tick, kph));
    batch.push(cluster(tick, kph, inputs.cruise_button));
    batch.push(gateway_lamps(inputs.blinker_left, inputs.blinker_right));
    batch.push(cruise_main(tick, true));
    batch.push(cruise_control(tick, inputs.engaged));

    match inputs.wheel_angle_frame {
        Some(frame) => batch.push(frame),
        None => batch.push(
            SteeringAngleFeedback {
                angle_deg: inputs.steering_angle_deg,
                rate_deg_s: 0.0,
                msg_count: RollingCounter::CLUSTER.at(tick),
            }
            .to_frame(),
        ),
    }

    if let Some(frame) = inputs.wheel_torque_frame {
        batch.push(frame);
    }
}
