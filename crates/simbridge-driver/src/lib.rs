//! 桥接器驱动层
//!
//! 负责控制循环之外的全部后台线程和跨线程状态：
//! - 共享状态（`ArcSwap` 快照发布，单写多读）
//! - 收发线程：周期帧合成 + 驾驶栈出站帧合并发送，方向盘反馈提取
//! - 车辆状态发布线程：向驾驶栈发布入站总线帧
//! - 遥测线程：设备/外设/驾驶员监控状态
//! - 线程生命周期：取消令牌 + 逆序 join

pub mod bus;
pub mod cancel;
mod error;
pub mod messages;
pub mod metrics;
pub mod rate;
pub mod state;
pub mod telemetry;
pub mod transceiver;
pub mod workers;

pub use bus::{LocalBus, StackBus};
pub use cancel::CancellationToken;
pub use error::DriverError;
pub use messages::*;
pub use metrics::{BridgeMetrics, MetricsSnapshot};
pub use rate::RateKeeper;
pub use state::*;
pub use telemetry::{TelemetryConfig, device_state_loop, driver_monitoring_loop, peripheral_state_loop};
pub use transceiver::{TransceiverConfig, carstate_loop, sendcan_loop};
pub use workers::{ShutdownReport, WorkerSet};
