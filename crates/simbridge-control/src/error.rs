//! 会话错误类型

use crate::config::ConfigError;
use crate::sim::SimError;
use simbridge_can::CanError;
use simbridge_driver::DriverError;
use thiserror::Error;

/// 桥接会话错误
///
/// 按来源分类，[`BridgeError::is_transient`] 决定会话是否值得重建。
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Simulator error: {0}")]
    Sim(#[from] SimError),

    /// 打开硬件设备失败
    #[error("CAN device error: {0}")]
    Device(#[from] CanError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<BridgeError> },
}

impl BridgeError {
    /// 是否可以通过重建会话恢复
    pub fn is_transient(&self) -> bool {
        match self {
            BridgeError::Config(_) => false,
            BridgeError::Sim(e) => e.is_transient(),
            BridgeError::Device(e) => !e.is_fatal(),
            BridgeError::Driver(DriverError::ThreadSpawn { .. }) => false,
            BridgeError::Driver(e) => !e.is_fatal(),
            BridgeError::RetriesExhausted { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(!BridgeError::from(ConfigError::Invalid("x".into())).is_transient());
        assert!(BridgeError::from(SimError::Connection("refused".into())).is_transient());
        assert!(
            !BridgeError::from(SimError::InvalidSpawnPoint {
                requested: 3,
                available: 1
            })
            .is_transient()
        );
        assert!(BridgeError::from(DriverError::ChannelClosed).is_transient());
        assert!(!BridgeError::from(DriverError::Can(CanError::UnknownBus(2))).is_transient());
        assert!(!BridgeError::from(CanError::UnknownBus(9)).is_transient());
        assert!(BridgeError::from(CanError::Timeout).is_transient());
    }

    #[test]
    fn test_exhausted_wraps_last() {
        let err = BridgeError::RetriesExhausted {
            attempts: 3,
            last: Box::new(SimError::Connection("refused".into()).into()),
        };
        assert!(!err.is_transient());
        assert!(err.to_string().contains("3 attempts"));
        assert!(err.to_string().contains("refused"));
    }
}
