//! 驾驶栈消息
//!
//! 桥接器与驾驶栈之间交换的记录。只描述桥接器读写的字段，
//! 驾驶栈内部的其余字段不在此定义。

use serde::{Deserialize, Serialize};
use simbridge_protocol::BusFrame;

/// 驾驶栈执行器目标（carControl.actuators）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActuatorTarget {
    /// 归一化加速度（m/s²）
    pub accel: f64,
    /// 目标方向盘角度（度）
    pub steering_angle_deg: f64,
}

/// 驾驶栈回显的车辆状态（carState）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CarStateEcho {
    /// 实际方向盘角度（度）
    pub steering_angle_deg: f64,
}

/// 设备类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PandaType {
    BlackPanda,
}

/// 安全模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SafetyModel {
    Hyundai,
}

/// Hyundai 纵向控制标志
pub const SAFETY_PARAM_HYUNDAI_LONG: u16 = 4;

/// 设备健康状态
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub ignition_line: bool,
    pub controls_allowed: bool,
    pub panda_type: PandaType,
    pub safety_model: SafetyModel,
    pub safety_param: u16,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            ignition_line: true,
            controls_allowed: true,
            panda_type: PandaType::BlackPanda,
            safety_model: SafetyModel::Hyundai,
            safety_param: SAFETY_PARAM_HYUNDAI_LONG,
        }
    }
}

/// 外设电源/风扇读数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralState {
    pub panda_type: PandaType,
    /// 电压（mV）
    pub voltage: u32,
    /// 电流（mA）
    pub current: u32,
    pub fan_speed_rpm: u16,
}

impl Default for PeripheralState {
    fn default() -> Self {
        Self {
            panda_type: PandaType::BlackPanda,
            voltage: 12000,
            current: 5678,
            fan_speed_rpm: 1000,
        }
    }
}

/// 驾驶员监控模型输出
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriverState {
    pub face_prob: f32,
}

/// 驾驶员监控结论
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriverMonitoringState {
    pub face_detected: bool,
    pub is_distracted: bool,
    pub awareness_status: f32,
}

impl DriverMonitoringState {
    /// 始终专注的驾驶员
    pub fn attentive() -> Self {
        Self {
            face_detected: true,
            is_distracted: false,
            awareness_status: 1.0,
        }
    }
}

/// 道路摄像头帧元数据
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadCameraState {
    /// 桥接器本地帧号（从 0 递增）
    pub frame_id: u32,
    /// 模拟器帧号
    pub sim_frame: u64,
    /// 帧结束时间戳（秒）
    pub timestamp_eof: f64,
    /// 3×3 外参变换（行优先）
    pub transform: [f32; 9],
}

/// 传感器事件
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SensorEvent {
    /// 加速度计（m/s²）
    Acceleration { sensor: u8, v: [f64; 3] },
    /// 陀螺仪（rad/s，未校准）
    GyroUncalibrated { sensor: u8, v: [f64; 3] },
}

/// GPS 数据来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GpsSource {
    Ublox,
}

/// 外部 GPS 定位
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsLocation {
    /// Unix 时间戳（毫秒）
    pub timestamp_ms: u64,
    /// 1 = 有效定位
    pub flags: u8,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// 速度（m/s）
    pub speed: f64,
    /// 北-东-地速度（m/s）
    pub v_ned: [f64; 3],
    pub bearing_deg: f64,
    pub accuracy: f32,
    pub vertical_accuracy: f32,
    pub speed_accuracy: f32,
    pub bearing_accuracy_deg: f32,
    pub source: GpsSource,
}

/// 桥接器发布给驾驶栈的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "service", content = "data", rename_all = "camelCase")]
pub enum StackMessage {
    /// 入站总线帧批次
    Can(Vec<BusFrame>),
    PandaStates(Vec<DeviceState>),
    PeripheralState(PeripheralState),
    DriverState(DriverState),
    DriverMonitoringState(DriverMonitoringState),
    RoadCameraState(RoadCameraState),
    SensorEvents(Vec<SensorEvent>),
    GpsLocationExternal(GpsLocation),
}

impl StackMessage {
    /// 服务名
    pub fn service(&self) -> &'static str {
        match self {
            StackMessage::Can(_) => "can",
            StackMessage::PandaStates(_) => "pandaStates",
            StackMessage::PeripheralState(_) => "peripheralState",
            StackMessage::DriverState(_) => "driverState",
            StackMessage::DriverMonitoringState(_) => "driverMonitoringState",
            StackMessage::RoadCameraState(_) => "roadCameraState",
            StackMessage::SensorEvents(_) => "sensorEvents",
            StackMessage::GpsLocationExternal(_) => "gpsLocationExternal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_records_match_fake_hardware() {
        let dev = DeviceState::default();
        assert!(dev.ignition_line && dev.controls_allowed);
        assert_eq!(dev.safety_model, SafetyModel::Hyundai);

        let p = PeripheralState::default();
        assert_eq!((p.voltage, p.current, p.fan_speed_rpm), (12000, 5678, 1000));
    }

    #[test]
    fn test_service_names_match_serialized_tag() {
        let msg = StackMessage::DriverState(DriverState { face_prob: 1.0 });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["service"], msg.service());
        assert_eq!(json["data"]["face_prob"], 1.0);

        let msg = StackMessage::PandaStates(vec![DeviceState::default()]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["service"], "pandaStates");
        assert_eq!(json["data"][0]["safety_model"], "hyundai");
    }

    #[test]
    fn test_sensor_event_tagged() {
        let ev = SensorEvent::GyroUncalibrated {
            sensor: 5,
            v: [0.0, 0.1, 0.2],
        };
        let json = serde_json::to_value(ev).unwrap();
        assert_eq!(json["kind"], "gyroUncalibrated");
        assert_eq!(json["sensor"], 5);
    }
}
