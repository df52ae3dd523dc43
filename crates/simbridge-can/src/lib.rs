//! # Simbridge CAN Device Layer
//!
//! 车辆总线硬件抽象层：批量发送、轮询接收、安全模式。
//!
//! - `socketcan`: Linux SocketCAN 后端，总线编号映射到接口列表下标
//! - `mock`: 内存设备（feature `mock`），用于测试和无硬件运行

use thiserror::Error;

pub use simbridge_protocol::BusFrame;

#[cfg(target_os = "linux")]
pub mod socketcan;

#[cfg(target_os = "linux")]
pub use self::socketcan::SocketCanDevice;

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use self::mock::MockCanDevice;

/// CAN 设备层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] CanDeviceError),
    #[error("No interface configured for bus {0}")]
    UnknownBus(u8),
    #[error("Output disabled by safety mode {0:?}")]
    OutputDisabled(SafetyMode),
    #[error("Read timeout")]
    Timeout,
    #[error("Buffer overflow")]
    BufferOverflow,
}

impl CanError {
    /// 是否需要终止会话（设备丢失/无权限）
    pub fn is_fatal(&self) -> bool {
        match self {
            CanError::Device(e) => e.is_fatal(),
            CanError::UnknownBus(_) => true,
            _ => false,
        }
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanDeviceErrorKind {
    Unknown,
    NotFound,
    NoDevice,
    AccessDenied,
    InvalidFrame,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct CanDeviceError {
    pub kind: CanDeviceErrorKind,
    pub message: String,
}

impl CanDeviceError {
    pub fn new(kind: CanDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            CanDeviceErrorKind::NoDevice
                | CanDeviceErrorKind::AccessDenied
                | CanDeviceErrorKind::NotFound
        )
    }
}

/// 设备输出权限
///
/// 设备打开后处于 `Silent`，会话开始时切换到 `AllOutput` 并保持到会话结束。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafetyMode {
    /// 只收不发
    #[default]
    Silent,
    /// 全部输出
    AllOutput,
}

/// 车辆总线设备
///
/// 发送为整批一次调用；接收为轮询，调用方反复调用 `recv` 直到返回 0。
pub trait CanDevice: Send {
    /// 设置输出权限
    fn set_safety_mode(&mut self, mode: SafetyMode) -> Result<(), CanError>;

    /// 整批发送
    fn send_many(&mut self, frames: &[BusFrame]) -> Result<(), CanError>;

    /// 非阻塞接收，追加到 `out`，返回本次读到的帧数（0 表示已无待读帧）
    fn recv(&mut self, out: &mut Vec<BusFrame>) -> Result<usize, CanError>;
}

impl<D: CanDevice + ?Sized> CanDevice for Box<D> {
    fn set_safety_mode(&mut self, mode: SafetyMode) -> Result<(), CanError> {
        (**self).set_safety_mode(mode)
    }

    fn send_many(&mut self, frames: &[BusFrame]) -> Result<(), CanError> {
        (**self).send_many(frames)
    }

    fn recv(&mut self, out: &mut Vec<BusFrame>) -> Result<usize, CanError> {
        (**self).recv(out)
    }
}
