//! 遥测发布线程
//!
//! 三个互相独立的固定周期循环，发布合成的设备/外设/驾驶员监控状态，
//! 不读取车辆状态。每个周期检查一次取消令牌。

use crate::bus::StackBus;
use crate::cancel::CancellationToken;
use crate::error::DriverError;
use crate::messages::*;
use crate::metrics::BridgeMetrics;
use spin_sleep::SpinSleeper;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::debug;

/// 遥测周期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub device_period: Duration,
    pub peripheral_period: Duration,
    pub driver_monitoring_period: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            device_period: Duration::from_millis(500),
            peripheral_period: Duration::from_millis(500),
            driver_monitoring_period: Duration::from_millis(50),
        }
    }
}

fn publish_periodic<F>(
    name: &'static str,
    bus: &dyn StackBus,
    period: Duration,
    cancel: &CancellationToken,
    metrics: &BridgeMetrics,
    mut make: F,
) -> Result<(), DriverError>
where
    F: FnMut() -> Vec<StackMessage>,
{
    let sleeper = SpinSleeper::default();
    let mut published: u64 = 0;

    while !cancel.is_cancelled() {
        for msg in make() {
            bus.publish(msg)?;
            metrics.telemetry_published.fetch_add(1, Ordering::Relaxed);
            published += 1;
        }
        sleeper.sleep(period);
    }

    debug!("{}: cancelled after {} messages", name, published);
    Ok(())
}

/// 设备健康状态
pub fn device_state_loop(
    bus: Arc<dyn StackBus>,
    period: Duration,
    cancel: CancellationToken,
    metrics: Arc<BridgeMetrics>,
) -> Result<(), DriverError> {
    publish_periodic("device_state", bus.as_ref(), period, &cancel, &metrics, || {
        vec![StackMessage::PandaStates(vec![DeviceState::default()])]
    })
}

/// 外设电源/风扇
pub fn peripheral_state_loop(
    bus: Arc<dyn StackBus>,
    period: Duration,
    cancel: CancellationToken,
    metrics: Arc<BridgeMetrics>,
) -> Result<(), DriverError> {
    publish_periodic("peripheral_state", bus.as_ref(), period, &cancel, &metrics, || {
        vec![StackMessage::PeripheralState(PeripheralState::default())]
    })
}

/// 驾驶员监控：模型输出和监控结论成对发布
pub fn driver_monitoring_loop(
    bus: Arc<dyn StackBus>,
    period: Duration,
    cancel: CancellationToken,
    metrics: Arc<BridgeMetrics>,
) -> Result<(), DriverError> {
    publish_periodic("driver_monitoring", bus.as_ref(), period, &cancel, &metrics, || {
        vec![
            StackMessage::DriverState(DriverState { face_prob: 1.0 }),
            StackMessage::DriverMonitoringState(DriverMonitoringState::attentive()),
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_driver_monitoring_pairs() {
        let bus = Arc::new(LocalBus::new());
        let rx = bus.subscribe();
        let cancel = CancellationToken::new();
        let metrics = Arc::new(BridgeMetrics::new());

        let handle = {
            let (bus, cancel, metrics) = (bus.clone(), cancel.clone(), metrics.clone());
            thread::spawn(move || driver_monitoring_loop(bus, Duration::from_millis(5), cancel, metrics))
        };

        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        cancel.cancel();
        handle.join().unwrap().unwrap();

        assert_eq!(first.service(), "driverState");
        assert_eq!(
            second,
            StackMessage::DriverMonitoringState(DriverMonitoringState {
                face_detected: true,
                is_distracted: false,
                awareness_status: 1.0,
            })
        );
    }

    #[test]
    fn test_exits_within_one_period_of_cancel() {
        let bus = Arc::new(LocalBus::new());
        let cancel = CancellationToken::new();
        let metrics = Arc::new(BridgeMetrics::new());
        let period = Duration::from_millis(50);

        let handle = {
            let (bus, cancel, metrics) = (bus.clone(), cancel.clone(), metrics.clone());
            thread::spawn(move || device_state_loop(bus, period, cancel, metrics))
        };
        thread::sleep(Duration::from_millis(20));

        let start = Instant::now();
        cancel.cancel();
        handle.join().unwrap().unwrap();
        assert!(start.elapsed() < period + Duration::from_millis(30));
        assert!(metrics.snapshot().telemetry_published >= 1);
    }

    #[test]
    fn test_peripheral_values() {
        let bus = Arc::new(LocalBus::new());
        let rx = bus.subscribe();
        let cancel = CancellationToken::new();
        let metrics = Arc::new(BridgeMetrics::new());

        let handle = {
            let (bus, cancel, metrics) = (bus.clone(), cancel.clone(), metrics.clone());
            thread::spawn(move || peripheral_state_loop(bus, Duration::from_millis(5), cancel, metrics))
        };
        let msg = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        cancel.cancel();
        handle.join().unwrap().unwrap();

        let StackMessage::PeripheralState(p) = msg else {
            panic!("expected peripheral state");
        };
        assert_eq!(p.voltage, 12000);
        assert_eq!(p.current, 5678);
        assert_eq!(p.fan_speed_rpm, 1000);
    }
}
