//! 驾驶栈消息总线
//!
//! 桥接器只关心三个输入（执行器目标、车辆状态回显、出站帧列表）
//! 和一个输出（发布消息）。输入均为“最新值”语义：读取不消费。

use crate::error::DriverError;
use crate::messages::{ActuatorTarget, CarStateEcho, StackMessage};
use arc_swap::{ArcSwap, ArcSwapOption};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use simbridge_protocol::BusFrame;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// 驾驶栈消息总线
pub trait StackBus: Send + Sync {
    /// 最新执行器目标，驾驶栈尚未发布时为 `None`
    fn car_control(&self) -> Option<ActuatorTarget>;

    /// 最新车辆状态回显
    fn car_state(&self) -> Option<CarStateEcho>;

    /// 最新出站帧列表（已编码，原样转发）
    fn sendcan(&self) -> Arc<Vec<BusFrame>>;

    /// 发布消息
    fn publish(&self, msg: StackMessage) -> Result<(), DriverError>;
}

/// 进程内总线
///
/// 输入槽由驾驶栈侧（或测试）写入，发布的消息扇出到所有订阅者。
/// 订阅者处理不过来时丢弃新消息并计数，发布方永不阻塞。
#[derive(Debug)]
pub struct LocalBus {
    car_control: ArcSwapOption<ActuatorTarget>,
    car_state: ArcSwapOption<CarStateEcho>,
    sendcan: ArcSwap<Vec<BusFrame>>,
    subscribers: Mutex<Vec<Sender<StackMessage>>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl LocalBus {
    /// 默认订阅队列容量
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            car_control: ArcSwapOption::empty(),
            car_state: ArcSwapOption::empty(),
            sendcan: ArcSwap::from_pointee(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn set_car_control(&self, target: ActuatorTarget) {
        self.car_control.store(Some(Arc::new(target)));
    }

    pub fn set_car_state(&self, echo: CarStateEcho) {
        self.car_state.store(Some(Arc::new(echo)));
    }

    pub fn set_sendcan(&self, frames: Vec<BusFrame>) {
        self.sendcan.store(Arc::new(frames));
    }

    /// 订阅之后发布的全部消息
    pub fn subscribe(&self) -> Receiver<StackMessage> {
        let (tx, rx) = crossbeam_channel::bounded(self.capacity);
        self.subscribers.lock().push(tx);
        rx
    }

    /// 因订阅队列满而丢弃的消息数
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl StackBus for LocalBus {
    fn car_control(&self) -> Option<ActuatorTarget> {
        self.car_control.load_full().map(|t| *t)
    }

    fn car_state(&self) -> Option<CarStateEcho> {
        self.car_state.load_full().map(|s| *s)
    }

    fn sendcan(&self) -> Arc<Vec<BusFrame>> {
        self.sendcan.load_full()
    }

    fn publish(&self, msg: StackMessage) -> Result<(), DriverError> {
        let mut subscribers = self.subscribers.lock();
        // 顺带清理已断开的订阅者
        subscribers.retain(|tx| match tx.try_send(msg.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!("subscriber queue full, {} dropped", msg.service());
                true
            },
            Err(TrySendError::Disconnected(_)) => false,
        });
        Ok(())
    }
}
