//! # Simbridge Control
//!
//! 控制仲裁与会话管理：
//!
//! - `command`: 手动控制命令语法
//! - `easing`: 转向限速与松手保持（ease-out）
//! - `arbiter`: 固定频率控制循环的单拍仲裁
//! - `sim`: 模拟器协作方接口与内置运动学模拟器
//! - `sensors`: 摄像头/IMU/GPS 回调转发
//! - `session`: 单次桥接会话（建立 → 循环 → 拆除）
//! - `supervisor`: 会话重启策略
//! - `config`: TOML 配置

pub mod arbiter;
pub mod command;
pub mod config;
pub mod easing;
mod error;
pub mod sensors;
pub mod session;
pub mod sim;
pub mod supervisor;

pub use arbiter::{ActuatorTriple, ArbiterOutput, ControlArbiter};
pub use command::{CommandParseError, ManualCommand};
pub use config::{BridgeConfig, ConfigError, SteerSource};
pub use easing::{EaseOut, ease_out, steer_rate_limit};
pub use error::BridgeError;
pub use sensors::SensorRelay;
pub use session::{BridgeSession, DeviceFactory, SessionSummary};
pub use sim::{SimError, Simulator, SimulatorConnector};
pub use supervisor::{RetryPolicy, run_with_restarts};
