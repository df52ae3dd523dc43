//! 收发线程
//!
//! - `sendcan_loop`: 周期帧 + 驾驶栈出站帧整批发往硬件，随后读空入站帧，
//!   提取方向盘反馈（总线 0 上的 SAS11 / MDPS12）
//! - `carstate_loop`: 把车辆状态快照编码为入站帧批次，发布到驾驶栈 `can` 服务

use crate::bus::StackBus;
use crate::cancel::CancellationToken;
use crate::error::DriverError;
use crate::messages::StackMessage;
use crate::metrics::BridgeMetrics;
use crate::state::{BridgeContext, SteeringFeedback};
use simbridge_can::{CanDevice, SafetyMode};
use simbridge_protocol::carstate::{CarStateInputs, encode_car_state};
use simbridge_protocol::feedback::{SteeringFrameKind, classify_steering_frame};
use simbridge_protocol::{
    BusFrame, FrameBatch, FrameSynthesizer, SteeringAngleFeedback, SteeringTorqueFeedback,
};
use spin_sleep::SpinSleeper;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// 收发线程配置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransceiverConfig {
    /// 发送周期
    pub period: Duration,
    /// EMS16 `ENG_STAT`
    pub engine_status: u8,
}

impl Default for TransceiverConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(10),
            engine_status: 3,
        }
    }
}

/// 硬件收发主循环
///
/// 驾驶栈尚未发布出站帧时空转一个周期且不推进帧序号。
/// 设备丢失等致命错误会取消整个会话并返回错误，其余发送错误只计数。
pub fn sendcan_loop<D: CanDevice>(
    mut device: D,
    bus: Arc<dyn StackBus>,
    ctx: Arc<BridgeContext>,
    config: TransceiverConfig,
    cancel: CancellationToken,
    metrics: Arc<BridgeMetrics>,
) -> Result<(), DriverError> {
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => info!("sendcan thread priority set to MAX (realtime)"),
            Err(e) => warn!(
                "Failed to set sendcan thread priority: {}. \
                On Linux, you may need to run with CAP_SYS_NICE.",
                e
            ),
        }
    }

    device.set_safety_mode(SafetyMode::AllOutput)?;
    info!("sendcan: device output enabled");

    let synth = FrameSynthesizer::new(config.engine_status);
    let sleeper = SpinSleeper::default();
    let mut batch = FrameBatch::new();
    let mut inbound: Vec<BusFrame> = Vec::with_capacity(64);
    let mut tick: u64 = 0;

    while !cancel.is_cancelled() {
        let sendcan = bus.sendcan();
        if sendcan.is_empty() {
            sleeper.sleep(config.period);
            continue;
        }

        batch.clear();
        let speed_mps = ctx.vehicle.load().speed_mps;
        synth.synthesize_into(tick, speed_mps, &mut batch);
        batch.extend_from_slice(&sendcan);

        match device.send_many(&batch) {
            Ok(()) => {
                metrics
                    .frames_sent
                    .fetch_add(batch.len() as u64, Ordering::Relaxed);
            },
            Err(e) => {
                error!("sendcan: failed to send {} frames: {}", batch.len(), e);
                metrics.send_errors.fetch_add(1, Ordering::Relaxed);
                if e.is_fatal() {
                    error!("sendcan: fatal device error, cancelling session");
                    cancel.cancel();
                    return Err(e.into());
                }
            },
        }

        drain_inbound(&mut device, &mut inbound, &ctx, &metrics)?;

        sleeper.sleep(config.period);
        tick += 1;
    }

    debug!("sendcan: cancelled after {} ticks", tick);
    Ok(())
}

/// 反复读取直到设备无待读帧，更新方向盘反馈
fn drain_inbound<D: CanDevice>(
    device: &mut D,
    inbound: &mut Vec<BusFrame>,
    ctx: &BridgeContext,
    metrics: &BridgeMetrics,
) -> Result<(), DriverError> {
    let mut feedback: Option<SteeringFeedback> = None;

    loop {
        inbound.clear();
        let n = match device.recv(inbound) {
            Ok(n) => n,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!("sendcan: receive error: {}", e);
                break;
            },
        };
        if n == 0 {
            break;
        }
        metrics.frames_received.fetch_add(n as u64, Ordering::Relaxed);

        for frame in inbound.iter() {
            let Some(kind) = classify_steering_frame(frame) else {
                continue;
            };
            metrics
                .steering_feedback_frames
                .fetch_add(1, Ordering::Relaxed);

            let fb = feedback.get_or_insert_with(|| ctx.steering_snapshot());
            match kind {
                SteeringFrameKind::Angle => {
                    fb.angle_frame = Some(*frame);
                    match SteeringAngleFeedback::try_from(*frame) {
                        Ok(angle) => fb.angle = Some(angle),
                        Err(e) => trace!("sendcan: undecodable angle frame {}: {}", frame, e),
                    }
                },
                SteeringFrameKind::Torque => {
                    fb.torque_frame = Some(*frame);
                    match SteeringTorqueFeedback::try_from(*frame) {
                        Ok(torque) => fb.torque = Some(torque),
                        Err(e) => trace!("sendcan: undecodable torque frame {}: {}", frame, e),
                    }
                },
            }
        }
    }

    // 一次读空只发布一次
    if let Some(fb) = feedback {
        ctx.steering.store(Arc::new(fb));
    }
    Ok(())
}

/// 车辆状态发布主循环，帧序号每周期推进
pub fn carstate_loop(
    bus: Arc<dyn StackBus>,
    ctx: Arc<BridgeContext>,
    period: Duration,
    cancel: CancellationToken,
    metrics: Arc<BridgeMetrics>,
) -> Result<(), DriverError> {
    let sleeper = SpinSleeper::default();
    let mut batch = FrameBatch::new();
    let mut tick: u64 = 0;

    while !cancel.is_cancelled() {
        let state = ctx.vehicle_snapshot();
        let steering = ctx.steering_snapshot();
        let inputs = CarStateInputs {
            speed_mps: state.speed_mps,
            steering_angle_deg: state.steering_angle_deg,
            cruise_button: state.cruise_button,
            engaged: state.engaged,
            blinker_left: state.blinkers.left,
            blinker_right: state.blinkers.right,
            wheel_angle_frame: steering.angle_frame,
            wheel_torque_frame: steering.torque_frame,
        };

        batch.clear();
        encode_car_state(tick, &inputs, &mut batch);
        bus.publish(StackMessage::Can(batch.to_vec()))?;
        metrics.carstate_batches.fetch_add(1, Ordering::Relaxed);

        sleeper.sleep(period);
        tick += 1;
    }

    debug!("carstate: cancelled after {} ticks", tick);
    Ok(())
}
