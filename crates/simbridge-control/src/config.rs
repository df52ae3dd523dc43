//! 桥接器配置
//!
//! TOML 文件，所有字段都有默认值，空文件即默认配置：
//!
//! ```toml
//! [simulator]
//! town = "Town04_Opt"
//! spawn_point = 16
//!
//! [control]
//! rate_hz = 100.0
//! steer_source = "feedback"
//!
//! [can]
//! interfaces = ["can0"]
//! ```

use crate::supervisor::RetryPolicy;
use serde::{Deserialize, Serialize};
use simbridge_driver::{TelemetryConfig, TransceiverConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// 配置错误（启动前致命）
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 发给模拟器的转向比例取自哪一路
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SteerSource {
    /// 驾驶栈回显的实际方向盘角度（接实体方向盘时使用）
    #[default]
    Feedback,
    /// 仲裁后的目标转角（无方向盘硬件时使用）
    Target,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorConfig {
    pub town: String,
    pub spawn_point: usize,
    /// 卸载植被/建筑等地图图层
    pub low_quality: bool,
    pub host: String,
    pub port: u16,
    pub timeout_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            town: "Town04_Opt".to_string(),
            spawn_point: 16,
            low_quality: false,
            host: "127.0.0.1".to_string(),
            port: 2000,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlConfig {
    pub rate_hz: f64,
    pub steer_ratio: f64,
    /// 松手保持拍数
    pub repeat_counter: u32,
    /// 单拍转向变化上限（度）
    pub steer_rate_limit: f64,
    pub throttle_manual_multiplier: f64,
    pub brake_manual_multiplier: f64,
    /// 手动转向满量程（度，乘以转向比）
    pub steer_manual_degrees: f64,
    /// 油门效率，发给模拟器前除以该值
    pub throttle_efficiency: f64,
    /// 状态日志间隔（拍）
    pub print_decimation: u64,
    pub print_delay_threshold_ms: u64,
    pub steer_source: SteerSource,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            rate_hz: 100.0,
            steer_ratio: 10.0,
            repeat_counter: 5,
            steer_rate_limit: 0.5,
            throttle_manual_multiplier: 0.7,
            brake_manual_multiplier: 0.7,
            steer_manual_degrees: 45.0,
            throttle_efficiency: 0.6,
            print_decimation: 100,
            print_delay_threshold_ms: 50,
            steer_source: SteerSource::Feedback,
        }
    }
}

impl ControlConfig {
    /// 手动转向乘数：满量程角度 × 转向比
    pub fn steer_manual_multiplier(&self) -> f64 {
        self.steer_manual_degrees * self.steer_ratio
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CanConfig {
    /// SocketCAN 接口，下标即总线编号；为空时使用 Mock 设备
    pub interfaces: Vec<String>,
    pub period_ms: u64,
    pub engine_status: u8,
}

impl Default for CanConfig {
    fn default() -> Self {
        Self {
            interfaces: Vec::new(),
            period_ms: 10,
            engine_status: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySettings {
    pub device_period_ms: u64,
    pub peripheral_period_ms: u64,
    pub driver_monitoring_period_ms: u64,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            device_period_ms: 500,
            peripheral_period_ms: 500,
            driver_monitoring_period_ms: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 8000,
        }
    }
}

/// 驾驶栈持久化开关（只记录日志，不写入驾驶栈）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    pub laneless: bool,
    pub disable_radar: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            laneless: false,
            disable_radar: true,
        }
    }
}

/// 桥接器配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub simulator: SimulatorConfig,
    pub control: ControlConfig,
    pub can: CanConfig,
    pub telemetry: TelemetrySettings,
    pub session: SessionConfig,
    pub stack: StackConfig,
}

impl BridgeConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.control;
        if !(c.rate_hz.is_finite() && c.rate_hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "control.rate_hz must be > 0, got {}",
                c.rate_hz
            )));
        }
        if !(c.steer_ratio.is_finite() && c.steer_ratio > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "control.steer_ratio must be > 0, got {}",
                c.steer_ratio
            )));
        }
        if !(c.throttle_efficiency.is_finite() && c.throttle_efficiency > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "control.throttle_efficiency must be > 0, got {}",
                c.throttle_efficiency
            )));
        }
        if !(c.steer_rate_limit.is_finite() && c.steer_rate_limit >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "control.steer_rate_limit must be >= 0, got {}",
                c.steer_rate_limit
            )));
        }
        if c.print_decimation == 0 {
            return Err(ConfigError::Invalid("control.print_decimation must be > 0".into()));
        }
        if self.can.period_ms == 0 {
            return Err(ConfigError::Invalid("can.period_ms must be > 0".into()));
        }
        if self.can.engine_status > 7 {
            return Err(ConfigError::Invalid(format!(
                "can.engine_status is a 3-bit field, got {}",
                self.can.engine_status
            )));
        }
        let t = &self.telemetry;
        if t.device_period_ms == 0 || t.peripheral_period_ms == 0 || t.driver_monitoring_period_ms == 0 {
            return Err(ConfigError::Invalid("telemetry periods must be > 0".into()));
        }
        if self.session.max_attempts == 0 {
            return Err(ConfigError::Invalid("session.max_attempts must be >= 1".into()));
        }
        Ok(())
    }

    pub fn transceiver_config(&self) -> TransceiverConfig {
        TransceiverConfig {
            period: Duration::from_millis(self.can.period_ms),
            engine_status: self.can.engine_status,
        }
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            device_period: Duration::from_millis(self.telemetry.device_period_ms),
            peripheral_period: Duration::from_millis(self.telemetry.peripheral_period_ms),
            driver_monitoring_period: Duration::from_millis(self.telemetry.driver_monitoring_period_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.session.max_attempts,
            initial_backoff: Duration::from_millis(self.session.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.session.max_backoff_ms),
        }
    }

    pub fn print_delay_threshold(&self) -> Duration {
        Duration::from_millis(self.control.print_delay_threshold_ms)
    }
}
