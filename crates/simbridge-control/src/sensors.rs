//! 传感器回调转发
//!
//! 模拟器回调在其自身线程上同步调用，这里直接处理并发布，不另起线程。
//! IMU 的罗盘读数同时写入共享航向，供 GPS 定位的 `bearing_deg` 使用。

use crate::sim::{CameraImage, CameraSpec, GnssSample, ImuSample, SensorCallback, SensorSample};
use simbridge_driver::{
    BridgeContext, DriverError, GpsLocation, GpsSource, RoadCameraState, SensorEvent, StackBus, StackMessage,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{trace, warn};

/// 加速度计的传感器编号
const SENSOR_ACCELEROMETER: u8 = 4;
/// 陀螺仪的传感器编号
const SENSOR_GYRO: u8 = 5;

const IDENTITY: [f32; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// 传感器转发器
pub struct SensorRelay {
    bus: Arc<dyn StackBus>,
    ctx: Arc<BridgeContext>,
    frame_id: AtomicU32,
    /// 摄像头帧间隔（秒），用于合成帧结束时间戳
    camera_interval: f64,
}

impl SensorRelay {
    pub fn new(bus: Arc<dyn StackBus>, ctx: Arc<BridgeContext>, camera: &CameraSpec) -> Self {
        Self {
            bus,
            ctx,
            frame_id: AtomicU32::new(0),
            camera_interval: camera.sensor_tick,
        }
    }

    /// 已转发的摄像头帧数
    pub fn camera_frames(&self) -> u32 {
        self.frame_id.load(Ordering::Relaxed)
    }

    pub fn on_sample(&self, sample: &SensorSample) -> Result<(), DriverError> {
        match sample {
            SensorSample::Camera(image) => self.on_camera(image),
            SensorSample::Imu(imu) => self.on_imu(imu),
            SensorSample::Gnss(gnss) => self.on_gnss(gnss),
        }
    }

    /// 摄像头帧：发布帧元数据，帧号为桥接器本地计数
    pub fn on_camera(&self, image: &CameraImage) -> Result<(), DriverError> {
        let frame_id = self.frame_id.fetch_add(1, Ordering::Relaxed);
        trace!(
            "camera frame {} (sim {}, {}x{}, {} bytes)",
            frame_id,
            image.frame,
            image.width,
            image.height,
            image.raw.len()
        );

        self.bus.publish(StackMessage::RoadCameraState(RoadCameraState {
            frame_id,
            sim_frame: image.frame,
            timestamp_eof: frame_id as f64 * self.camera_interval,
            transform: IDENTITY,
        }))
    }

    /// IMU：更新航向并发布加速度计和陀螺仪事件
    pub fn on_imu(&self, imu: &ImuSample) -> Result<(), DriverError> {
        self.ctx.heading.store(imu.compass.to_degrees());

        let a = imu.accelerometer;
        let g = imu.gyroscope;
        self.bus.publish(StackMessage::SensorEvents(vec![
            SensorEvent::Acceleration {
                sensor: SENSOR_ACCELEROMETER,
                v: [a.x, a.y, a.z],
            },
            SensorEvent::GyroUncalibrated {
                sensor: SENSOR_GYRO,
                v: [g.x, g.y, g.z],
            },
        ]))
    }

    /// GNSS：速度取自最近一次车辆状态，换算到北-东-地坐标
    pub fn on_gnss(&self, gnss: &GnssSample) -> Result<(), DriverError> {
        let state = self.ctx.vehicle_snapshot();
        let vel = state.velocity;
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        self.bus.publish(StackMessage::GpsLocationExternal(GpsLocation {
            timestamp_ms,
            flags: 1,
            latitude: gnss.latitude,
            longitude: gnss.longitude,
            altitude: gnss.altitude,
            speed: state.speed_mps,
            // 北向为模拟器 -y
            v_ned: [-vel.y, vel.x, vel.z],
            bearing_deg: self.ctx.heading.load(),
            accuracy: 1.0,
            vertical_accuracy: 1.0,
            speed_accuracy: 0.1,
            bearing_accuracy_deg: 0.1,
            source: GpsSource::Ublox,
        }))
    }

    /// 包装成模拟器回调，发布失败只记日志
    pub fn callback(self: &Arc<Self>) -> SensorCallback {
        let relay = Arc::clone(self);
        Box::new(move |sample| {
            if let Err(e) = relay.on_sample(&sample) {
                warn!("Failed to relay sensor sample: {}", e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use simbridge_driver::{LocalBus, VehicleState};

    fn relay() -> (Arc<SensorRelay>, Arc<LocalBus>, Arc<BridgeContext>) {
        let bus = Arc::new(LocalBus::new());
        let ctx = Arc::new(BridgeContext::new());
        let relay = Arc::new(SensorRelay::new(bus.clone(), ctx.clone(), &CameraSpec::default()));
        (relay, bus, ctx)
    }

    #[test]
    fn test_camera_frame_ids_and_timestamps() {
        let (relay, bus, _) = relay();
        let rx = bus.subscribe();
        let image = |frame| CameraImage {
            frame,
            width: 4,
            height: 2,
            raw: Arc::from(vec![0u8; 32]),
        };

        relay.on_camera(&image(1000)).unwrap();
        relay.on_camera(&image(1005)).unwrap();
        relay.on_camera(&image(1010)).unwrap();
        assert_eq!(relay.camera_frames(), 3);

        let states: Vec<RoadCameraState> = rx
            .try_iter()
            .map(|m| match m {
                StackMessage::RoadCameraState(s) => s,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(states.iter().map(|s| s.frame_id).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(states[2].sim_frame, 1010);
        assert!((states[2].timestamp_eof - 0.1).abs() < 1e-12);
        assert_eq!(states[0].transform, IDENTITY);
    }

    #[test]
    fn test_imu_updates_heading() {
        let (relay, bus, ctx) = relay();
        let rx = bus.subscribe();

        relay
            .on_imu(&ImuSample {
                accelerometer: Vector3::new(0.1, 0.2, 9.81),
                gyroscope: Vector3::new(0.0, 0.0, 0.05),
                compass: -std::f64::consts::FRAC_PI_2,
            })
            .unwrap();

        assert!((ctx.heading.load() - 270.0).abs() < 1e-9);
        match rx.try_recv().unwrap() {
            StackMessage::SensorEvents(events) => {
                assert_eq!(
                    events,
                    vec![
                        SensorEvent::Acceleration {
                            sensor: 4,
                            v: [0.1, 0.2, 9.81]
                        },
                        SensorEvent::GyroUncalibrated {
                            sensor: 5,
                            v: [0.0, 0.0, 0.05]
                        },
                    ]
                );
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_gnss_velocity_in_ned() {
        let (relay, bus, ctx) = relay();
        let rx = bus.subscribe();
        ctx.heading.store(90.0);
        ctx.publish_vehicle(VehicleState {
            speed_mps: 5.0,
            velocity: Vector3::new(3.0, -4.0, 0.0),
            ..VehicleState::default()
        });

        relay
            .on_gnss(&GnssSample {
                latitude: 48.1,
                longitude: 11.5,
                altitude: 520.0,
            })
            .unwrap();

        match rx.try_recv().unwrap() {
            StackMessage::GpsLocationExternal(fix) => {
                assert_eq!(fix.v_ned, [4.0, 3.0, 0.0]);
                assert_eq!(fix.speed, 5.0);
                assert_eq!(fix.bearing_deg, 90.0);
                assert_eq!(fix.flags, 1);
                assert_eq!(fix.latitude, 48.1);
                assert_eq!(fix.source, GpsSource::Ublox);
                assert!(fix.timestamp_ms > 0);
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_callback_dispatch() {
        let (relay, bus, ctx) = relay();
        let rx = bus.subscribe();
        let mut cb = relay.callback();

        cb(SensorSample::Imu(ImuSample {
            accelerometer: Vector3::zeros(),
            gyroscope: Vector3::zeros(),
            compass: std::f64::consts::PI,
        }));
        assert!((ctx.heading.load() - 180.0).abs() < 1e-9);
        assert_eq!(rx.try_recv().unwrap().service(), "sensorEvents");
    }
}
