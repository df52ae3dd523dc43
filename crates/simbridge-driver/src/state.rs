//! 跨线程共享状态
//!
//! 同步策略：
//! - `VehicleState`：控制循环每拍整体替换（`ArcSwap`），唯一写者
//! - `SteeringFeedback`：收发线程整体替换（`ArcSwap`），唯一写者
//! - 航向：IMU 回调写入的单个 `f64`（原子位模式）
//!
//! 读者每次拿到的都是完整快照，允许落后至多一拍，但不会看到半更新的字段。

use arc_swap::ArcSwap;
use nalgebra::Vector3;
use simbridge_protocol::{BusFrame, CruiseButton, SteeringAngleFeedback, SteeringTorqueFeedback};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 转向灯
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Blinkers {
    pub left: bool,
    pub right: bool,
}

/// 转向灯侧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkerSide {
    Left,
    Right,
}

impl Blinkers {
    /// 切换一侧
    pub fn toggle(&mut self, side: BlinkerSide) {
        match side {
            BlinkerSide::Left => self.left = !self.left,
            BlinkerSide::Right => self.right = !self.right,
        }
    }
}

/// 车辆状态快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    /// 车速（m/s，≥ 0）
    pub speed_mps: f64,
    /// 方向盘角度（度）
    pub steering_angle_deg: f64,
    /// 航向（度，[0, 360)）
    pub heading_deg: f64,
    /// 速度矢量（模拟器坐标系，m/s）
    pub velocity: Vector3<f64>,
    /// 驾驶栈是否接管
    pub engaged: bool,
    /// 本拍的巡航按键
    pub cruise_button: CruiseButton,
    pub blinkers: Blinkers,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            speed_mps: 0.0,
            steering_angle_deg: 0.0,
            heading_deg: 0.0,
            velocity: Vector3::zeros(),
            engaged: false,
            cruise_button: CruiseButton::None,
            blinkers: Blinkers::default(),
        }
    }
}

/// 方向盘硬件反馈
///
/// 原始帧用于原样转发给驾驶栈，解码值用于日志和状态展示。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SteeringFeedback {
    pub angle_frame: Option<BusFrame>,
    pub torque_frame: Option<BusFrame>,
    pub angle: Option<SteeringAngleFeedback>,
    pub torque: Option<SteeringTorqueFeedback>,
}

/// 航向（度），写入时归一化到 [0, 360)
#[derive(Debug, Default)]
pub struct HeadingCell {
    bits: AtomicU64,
}

impl HeadingCell {
    pub fn store(&self, heading_deg: f64) {
        self.bits
            .store(wrap_degrees(heading_deg).to_bits(), Ordering::Relaxed);
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// 角度归一化到 [0, 360)
pub fn wrap_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid 对极小负数可能返回 360.0
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// 会话共享上下文
#[derive(Debug)]
pub struct BridgeContext {
    pub vehicle: ArcSwap<VehicleState>,
    pub steering: ArcSwap<SteeringFeedback>,
    pub heading: HeadingCell,
}

impl BridgeContext {
    pub fn new() -> Self {
        Self {
            vehicle: ArcSwap::from_pointee(VehicleState::default()),
            steering: ArcSwap::from_pointee(SteeringFeedback::default()),
            heading: HeadingCell::default(),
        }
    }

    /// 发布新的车辆状态快照
    pub fn publish_vehicle(&self, state: VehicleState) {
        self.vehicle.store(Arc::new(state));
    }

    /// 当前车辆状态快照（拷贝）
    pub fn vehicle_snapshot(&self) -> VehicleState {
        **self.vehicle.load()
    }

    /// 当前方向盘反馈快照（拷贝）
    pub fn steering_snapshot(&self) -> SteeringFeedback {
        **self.steering.load()
    }
}

impl Default for BridgeContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_blinker_toggle() {
        let mut b = Blinkers::default();
        b.toggle(BlinkerSide::Left);
        assert_eq!(b, Blinkers { left: true, right: false });
        b.toggle(BlinkerSide::Right);
        b.toggle(BlinkerSide::Left);
        assert_eq!(b, Blinkers { left: false, right: true });
    }

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(0.0), 0.0);
        assert!((wrap_degrees(-90.0) - 270.0).abs() < 1e-9);
        assert!((wrap_degrees(725.0) - 5.0).abs() < 1e-9);
        assert!(wrap_degrees(-1e-18) < 360.0);
    }

    #[test]
    fn test_heading_cell_wraps() {
        let cell = HeadingCell::default();
        cell.store(-45.0);
        assert!((cell.load() - 315.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_is_never_partial() {
        let ctx = Arc::new(BridgeContext::new());
        let writer = {
            let ctx = ctx.clone();
            thread::spawn(move || {
                for i in 0..2000 {
                    let v = i as f64;
                    ctx.publish_vehicle(VehicleState {
                        speed_mps: v,
                        steering_angle_deg: v,
                        heading_deg: v,
                        ..Default::default()
                    });
                }
            })
        };

        for _ in 0..2000 {
            let s = ctx.vehicle_snapshot();
            assert_eq!(s.speed_mps, s.steering_angle_deg);
            assert_eq!(s.speed_mps, s.heading_deg);
        }
        writer.join().unwrap();
    }
}
