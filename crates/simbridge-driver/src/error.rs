//! 驱动层错误类型定义

use simbridge_can::CanError;
use simbridge_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// CAN 设备错误
    #[error("CAN driver error: {0}")]
    Can(#[from] CanError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 线程创建失败
    #[error("Failed to spawn thread {name}: {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// 线程 panic 或未在超时内退出
    #[error("Thread {0} panicked or failed to shut down")]
    ThreadJoin(String),

    /// 驾驶栈消息通道已关闭
    #[error("Message channel closed")]
    ChannelClosed,
}

impl DriverError {
    /// 是否为设备丢失等不可恢复错误
    pub fn is_fatal(&self) -> bool {
        match self {
            DriverError::Can(e) => e.is_fatal(),
            _ => false,
        }
    }
}
