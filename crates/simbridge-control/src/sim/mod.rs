//! 模拟器协作方接口
//!
//! 桥接器只依赖这里的 trait：连接、加载地图、生成车辆和传感器、
//! 下发控制、读取速度、推进仿真、销毁 actor。
//! 内置的 [`kinematic`] 实现用于无外部模拟器时运行和测试。

pub mod kinematic;

use nalgebra::Vector3;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use kinematic::{KinematicConnector, KinematicSimulator};

/// 模拟器错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Simulator connection failed: {0}")]
    Connection(String),

    #[error("Spawn point {requested} out of range ({available} available)")]
    InvalidSpawnPoint { requested: usize, available: usize },

    #[error("Actor {0:?} not found")]
    ActorNotFound(ActorId),

    #[error("Simulator runtime error: {0}")]
    Runtime(String),
}

impl SimError {
    /// 是否值得重建会话重试
    pub fn is_transient(&self) -> bool {
        !matches!(self, SimError::InvalidSpawnPoint { .. })
    }
}

/// actor 句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u32);

/// 可卸载的地图图层
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapLayer {
    Foliage,
    Buildings,
    ParkedVehicles,
    Particles,
    Props,
    StreetLights,
}

/// 低画质模式下卸载的图层
pub const LOW_QUALITY_LAYERS: [MapLayer; 6] = [
    MapLayer::Foliage,
    MapLayer::Buildings,
    MapLayer::ParkedVehicles,
    MapLayer::Particles,
    MapLayer::Props,
    MapLayer::StreetLights,
];

/// 相对父 actor 的安装位置（米）和偏航（度）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub location: Vector3<f64>,
    pub yaw_deg: f64,
}

impl Transform {
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self {
            location: Vector3::new(x, y, z),
            yaw_deg: 0.0,
        }
    }

    /// 传感器安装位置（车顶前方）
    pub fn sensor_mount() -> Self {
        Self::at(0.8, 0.0, 1.13)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelPhysics {
    /// 最大转角（度）
    pub max_steer_angle: f64,
}

/// 车辆物理参数
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsControl {
    /// 质量（kg）
    pub mass: f64,
    /// 扭矩曲线 `(rpm, Nm)`
    pub torque_curve: Vec<(f64, f64)>,
    /// 换挡时间（秒）
    pub gear_switch_time: f64,
    /// 前轮在前
    pub wheels: Vec<WheelPhysics>,
}

impl PhysicsControl {
    /// 桥接器使用的车辆调校：加重、平直扭矩曲线、瞬时换挡
    pub fn tuned(mut self) -> Self {
        self.mass = 2326.0;
        self.torque_curve = vec![(20.0, 500.0), (5000.0, 500.0)];
        self.gear_switch_time = 0.0;
        self
    }

    /// 前轮最大转角
    pub fn max_steer_angle(&self) -> Option<f64> {
        self.wheels.first().map(|w| w.max_steer_angle)
    }
}

/// 车辆控制量
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VehicleControl {
    /// [0, 1] 之外的值由模拟器自行截断
    pub throttle: f64,
    /// [-1, 1]
    pub steer: f64,
    pub brake: f64,
}

/// 摄像头参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSpec {
    pub width: u32,
    pub height: u32,
    /// 焦距（像素）
    pub focal_length: f64,
    /// 采样间隔（秒）
    pub sensor_tick: f64,
}

impl CameraSpec {
    /// 水平视场角（度）
    pub fn fov_deg(&self) -> f64 {
        (2.0 * (self.width as f64 / (2.0 * self.focal_length)).atan()).to_degrees()
    }
}

impl Default for CameraSpec {
    fn default() -> Self {
        Self {
            width: 1928,
            height: 1208,
            focal_length: 2648.0,
            sensor_tick: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorKind {
    Camera(CameraSpec),
    Imu,
    Gnss,
}

/// 摄像头帧
#[derive(Debug, Clone, PartialEq)]
pub struct CameraImage {
    /// 模拟器帧号
    pub frame: u64,
    pub width: u32,
    pub height: u32,
    /// BGRA 原始数据
    pub raw: Arc<[u8]>,
}

/// IMU 采样
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    /// m/s²
    pub accelerometer: Vector3<f64>,
    /// rad/s
    pub gyroscope: Vector3<f64>,
    /// 罗盘（弧度，0 = 北）
    pub compass: f64,
}

/// GNSS 定位
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GnssSample {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SensorSample {
    Camera(CameraImage),
    Imu(ImuSample),
    Gnss(GnssSample),
}

/// 传感器回调，在模拟器线程上同步执行
pub type SensorCallback = Box<dyn FnMut(SensorSample) + Send>;

/// 连接参数
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorSettings {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

/// 已连接的模拟器
pub trait Simulator: Send {
    fn load_world(&mut self, town: &str) -> Result<(), SimError>;

    fn unload_map_layers(&mut self, layers: &[MapLayer]) -> Result<(), SimError>;

    /// 地图上可用的出生点数量
    fn spawn_point_count(&self) -> usize;

    /// 在第 `index` 个出生点生成自车
    fn spawn_vehicle(&mut self, index: usize) -> Result<ActorId, SimError>;

    fn physics(&self, vehicle: ActorId) -> Result<PhysicsControl, SimError>;

    fn apply_physics(&mut self, vehicle: ActorId, physics: PhysicsControl) -> Result<(), SimError>;

    /// 生成挂在 `parent` 上的传感器，采样通过 `callback` 投递
    fn spawn_sensor(
        &mut self,
        kind: SensorKind,
        mount: Transform,
        parent: ActorId,
        callback: SensorCallback,
    ) -> Result<ActorId, SimError>;

    fn apply_control(&mut self, vehicle: ActorId, control: VehicleControl) -> Result<(), SimError>;

    /// 速度矢量（m/s）
    fn velocity(&self, vehicle: ActorId) -> Result<Vector3<f64>, SimError>;

    /// 推进仿真 `dt`（异步模式的模拟器可以忽略）
    fn step(&mut self, dt: Duration) -> Result<(), SimError>;

    fn destroy(&mut self, actor: ActorId) -> Result<(), SimError>;
}

/// 模拟器连接工厂，每次会话重建时调用一次
pub trait SimulatorConnector: Send + Sync {
    fn connect(&self, settings: &SimulatorSettings) -> Result<Box<dyn Simulator>, SimError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuned_physics() {
        let physics = PhysicsControl {
            mass: 1500.0,
            torque_curve: vec![(0.0, 300.0)],
            gear_switch_time: 0.5,
            wheels: vec![WheelPhysics { max_steer_angle: 70.0 }],
        }
        .tuned();
        assert_eq!(physics.mass, 2326.0);
        assert_eq!(physics.torque_curve, vec![(20.0, 500.0), (5000.0, 500.0)]);
        assert_eq!(physics.gear_switch_time, 0.0);
        assert_eq!(physics.max_steer_angle(), Some(70.0));
    }

    #[test]
    fn test_camera_fov() {
        let fov = CameraSpec::default().fov_deg();
        assert!((fov - 40.0).abs() < 0.1, "{fov}");
    }

    #[test]
    fn test_error_classification() {
        assert!(SimError::Connection("refused".into()).is_transient());
        assert!(SimError::Runtime("time-out".into()).is_transient());
        assert!(
            !SimError::InvalidSpawnPoint {
                requested: 200,
                available: 100
            }
            .is_transient()
        );
    }
}
