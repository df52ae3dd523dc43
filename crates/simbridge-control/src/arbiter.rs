//! 控制仲裁
//!
//! 每拍依次执行：
//! 1. 处理至多一条手动命令（乘以手动系数，更新接管状态和巡航按键脉冲）
//! 2. 接管时取驾驶栈目标（加速度映射为油门/刹车，转向限速）；
//!    未接管时三个通道各自做松手保持
//! 3. 计算发给模拟器的归一化转向比例，裁剪到 [-1, 1]
//!
//! 转向存在两套值：仲裁得到的目标转角只用于平滑记账，
//! 实际下发的比例由 [`SteerSource`] 决定取自方向盘反馈还是目标转角。
//! 无论哪种，本拍结束时转向记账值都会被改写为下发比例对应的角度。

use crate::command::ManualCommand;
use crate::config::{ControlConfig, SteerSource};
use crate::easing::{EaseOut, steer_rate_limit};
use crate::sim::VehicleControl;
use simbridge_driver::{ActuatorTarget, Blinkers};
use simbridge_protocol::CruiseButton;

/// 油门/转向/刹车
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActuatorTriple {
    pub throttle: f64,
    /// 方向盘角度（度）
    pub steer: f64,
    pub brake: f64,
}

/// 单拍仲裁结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArbiterOutput {
    /// 仲裁后（归一化前）的执行器值
    pub resolved: ActuatorTriple,
    /// 下发给模拟器的控制量
    pub control: VehicleControl,
    /// 下发比例对应的方向盘角度（度），即发布到车辆状态的转角
    pub steer_deg: f64,
    pub cruise_button: CruiseButton,
    pub engaged: bool,
    pub blinkers: Blinkers,
    /// 收到退出命令，本拍结束后退出循环
    pub quit: bool,
}

/// 控制仲裁器
#[derive(Debug, Clone)]
pub struct ControlArbiter {
    config: ControlConfig,
    throttle: EaseOut,
    brake: EaseOut,
    steer: EaseOut,
    engaged: bool,
    blinkers: Blinkers,
}

/// 加速度 → 油门
#[inline]
fn accel_to_throttle(accel: f64) -> f64 {
    (accel / 1.6).clamp(0.0, 1.0)
}

/// 加速度 → 刹车
#[inline]
fn accel_to_brake(accel: f64) -> f64 {
    (-accel / 4.0).clamp(0.0, 1.0)
}

impl ControlArbiter {
    pub fn new(config: ControlConfig) -> Self {
        let repeat = config.repeat_counter;
        Self {
            config,
            throttle: EaseOut::new(repeat),
            brake: EaseOut::new(repeat),
            steer: EaseOut::new(repeat),
            engaged: false,
            blinkers: Blinkers::default(),
        }
    }

    pub fn engaged(&self) -> bool {
        self.engaged
    }

    pub fn blinkers(&self) -> Blinkers {
        self.blinkers
    }

    /// 上一拍的执行器记账值
    pub fn held(&self) -> ActuatorTriple {
        ActuatorTriple {
            throttle: self.throttle.held,
            steer: self.steer.held,
            brake: self.brake.held,
        }
    }

    /// 方向盘角度 → 模拟器转向比例
    ///
    /// 比例 = 角度 / (最大轮角 × 转向比 × -1)，裁剪到 [-1, 1]。
    /// 最大轮角为 0 或结果非有限值时输出 0。
    pub fn steer_ratio(&self, angle_deg: f64, max_steer_angle: f64) -> f64 {
        let scale = self.steer_scale(max_steer_angle);
        let ratio = angle_deg / scale;
        if ratio.is_finite() { ratio.clamp(-1.0, 1.0) } else { 0.0 }
    }

    #[inline]
    fn steer_scale(&self, max_steer_angle: f64) -> f64 {
        max_steer_angle * self.config.steer_ratio * -1.0
    }

    /// 执行一拍仲裁
    ///
    /// - `command`：本拍取出的命令（至多一条）
    /// - `actual_angle`：驾驶栈回显的实际方向盘角度
    /// - `target`：驾驶栈最近一次执行器目标，未发布时按全零处理
    /// - `max_steer_angle`：前轮最大转角（度）
    pub fn step(
        &mut self,
        command: Option<ManualCommand>,
        actual_angle: f64,
        target: Option<ActuatorTarget>,
        max_steer_angle: f64,
    ) -> ArbiterOutput {
        let mut manual = ActuatorTriple::default();
        let mut cruise_button = CruiseButton::None;
        let mut quit = false;

        let mut out = ActuatorTriple::default();
        if let Some(command) = command {
            match command {
                ManualCommand::Steer(v) => manual.steer = v,
                ManualCommand::Throttle(v) => {
                    manual.throttle = v;
                    self.engaged = false;
                },
                ManualCommand::Brake(v) => {
                    manual.brake = v;
                    self.engaged = false;
                },
                ManualCommand::Reverse | ManualCommand::CruiseCancel => {
                    cruise_button = CruiseButton::Cancel;
                    self.engaged = false;
                },
                ManualCommand::CruiseDown => {
                    cruise_button = CruiseButton::SetDecel;
                    self.engaged = true;
                },
                ManualCommand::CruiseUp => {
                    cruise_button = CruiseButton::ResAccel;
                    self.engaged = true;
                },
                ManualCommand::ToggleBlinker(side) => self.blinkers.toggle(side),
                ManualCommand::Quit => quit = true,
            }

            out = ActuatorTriple {
                throttle: manual.throttle * self.config.throttle_manual_multiplier,
                steer: manual.steer * self.config.steer_manual_multiplier(),
                brake: manual.brake * self.config.brake_manual_multiplier,
            };
            self.throttle.held = out.throttle;
            self.steer.held = out.steer;
            self.brake.held = out.brake;
        }

        if self.engaged {
            let target = target.unwrap_or_default();
            out.throttle = accel_to_throttle(target.accel);
            out.brake = accel_to_brake(target.accel);
            out.steer = steer_rate_limit(
                self.steer.held,
                target.steering_angle_deg,
                self.config.steer_rate_limit,
            );
            self.steer.held = out.steer;
        } else {
            out.throttle = self.throttle.resolve(out.throttle);
            out.brake = self.brake.resolve(out.brake);
            out.steer = self.steer.resolve(out.steer);
        }

        let source_angle = match self.config.steer_source {
            SteerSource::Feedback => actual_angle,
            SteerSource::Target => out.steer,
        };
        let ratio = self.steer_ratio(source_angle, max_steer_angle);
        let steer_deg = ratio * self.steer_scale(max_steer_angle);
        self.steer.held = steer_deg;

        ArbiterOutput {
            resolved: out,
            control: VehicleControl {
                throttle: out.throttle / self.config.throttle_efficiency,
                steer: ratio,
                brake: out.brake,
            },
            steer_deg,
            cruise_button,
            engaged: self.engaged,
            blinkers: self.blinkers,
            quit,
        }
    }
}
