//! 内置运动学模拟器
//!
//! 纵向为质点模型（驱动力、刹车、滚阻、风阻），横向为自行车模型。
//! 坐标系与常见游戏引擎一致：x 向东，y 向南，z 向上，偏航顺时针为正。
//! IMU/GNSS 每步触发一次，摄像头按 `sensor_tick` 触发（图像为空缓冲）。

use super::*;
use parking_lot::Mutex;
use std::f64::consts::{FRAC_PI_2, TAU};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

const GRAVITY: f64 = 9.81;
const WHEELBASE: f64 = 2.9;
const WHEEL_RADIUS: f64 = 0.35;
const FINAL_DRIVE: f64 = 8.0;
const MAX_BRAKE_DECEL: f64 = 8.0;
const ROLLING_RESISTANCE: f64 = 0.015;
const DRAG: f64 = 0.4;
/// 每度纬度对应的米数
const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Debug, Clone)]
struct Body {
    id: ActorId,
    position: Vector3<f64>,
    /// 弧度
    yaw: f64,
    speed: f64,
    accel: f64,
    yaw_rate: f64,
    physics: PhysicsControl,
    control: VehicleControl,
}

impl Body {
    fn new(id: ActorId, spawn_index: usize) -> Self {
        Self {
            id,
            position: Vector3::new(spawn_index as f64 * 10.0, 0.0, 0.0),
            yaw: -FRAC_PI_2,
            speed: 0.0,
            accel: 0.0,
            yaw_rate: 0.0,
            physics: PhysicsControl {
                mass: 1845.0,
                torque_curve: vec![(0.0, 400.0), (5000.0, 300.0)],
                gear_switch_time: 0.5,
                wheels: vec![WheelPhysics { max_steer_angle: 70.0 }; 4],
            },
            control: VehicleControl::default(),
        }
    }

    fn velocity(&self) -> Vector3<f64> {
        Vector3::new(self.speed * self.yaw.cos(), self.speed * self.yaw.sin(), 0.0)
    }

    fn integrate(&mut self, dt: f64) {
        let throttle = self.control.throttle.clamp(0.0, 1.0);
        let brake = self.control.brake.clamp(0.0, 1.0);
        let steer = self.control.steer.clamp(-1.0, 1.0);

        let max_torque = self
            .physics
            .torque_curve
            .iter()
            .map(|&(_, nm)| nm)
            .fold(0.0, f64::max);
        let mass = self.physics.mass.max(1.0);

        let drive = throttle * max_torque * FINAL_DRIVE / WHEEL_RADIUS / mass;
        let resist = if self.speed > 0.0 {
            brake * MAX_BRAKE_DECEL + ROLLING_RESISTANCE * GRAVITY + DRAG * self.speed * self.speed / mass
        } else {
            0.0
        };
        self.accel = drive - resist;
        self.speed = (self.speed + self.accel * dt).max(0.0);

        let wheel_angle = (steer * self.physics.max_steer_angle().unwrap_or(0.0)).to_radians();
        self.yaw_rate = self.speed * wheel_angle.tan() / WHEELBASE;
        self.yaw = (self.yaw + self.yaw_rate * dt).rem_euclid(TAU);

        self.position += self.velocity() * dt;
    }

    fn imu(&self) -> ImuSample {
        ImuSample {
            accelerometer: Vector3::new(self.accel, self.speed * self.yaw_rate, GRAVITY),
            gyroscope: Vector3::new(0.0, 0.0, self.yaw_rate),
            compass: (self.yaw + FRAC_PI_2).rem_euclid(TAU),
        }
    }

    fn gnss(&self) -> GnssSample {
        GnssSample {
            latitude: -self.position.y / METERS_PER_DEGREE,
            longitude: self.position.x / METERS_PER_DEGREE,
            altitude: self.position.z,
        }
    }
}

struct Sensor {
    id: ActorId,
    kind: SensorKind,
    callback: SensorCallback,
    /// 下次触发的仿真时间（秒）
    next_fire: f64,
}

/// 内置运动学模拟器
pub struct KinematicSimulator {
    spawn_points: usize,
    next_id: u32,
    world: Option<String>,
    unloaded: Vec<MapLayer>,
    vehicle: Option<Body>,
    sensors: Vec<Sensor>,
    time: f64,
    frame: u64,
    /// 剩余可执行步数，耗尽后 `step` 返回运行时错误
    step_budget: Option<u64>,
    destroyed: Arc<Mutex<Vec<ActorId>>>,
}

impl KinematicSimulator {
    pub fn new(spawn_points: usize) -> Self {
        Self {
            spawn_points,
            next_id: 1,
            world: None,
            unloaded: Vec::new(),
            vehicle: None,
            sensors: Vec::new(),
            time: 0.0,
            frame: 0,
            step_budget: None,
            destroyed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn world(&self) -> Option<&str> {
        self.world.as_deref()
    }

    pub fn unloaded_layers(&self) -> &[MapLayer] {
        &self.unloaded
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    fn next_actor(&mut self) -> ActorId {
        let id = ActorId(self.next_id);
        self.next_id += 1;
        id
    }

    fn body(&self, id: ActorId) -> Result<&Body, SimError> {
        self.vehicle
            .as_ref()
            .filter(|b| b.id == id)
            .ok_or(SimError::ActorNotFound(id))
    }

    fn body_mut(&mut self, id: ActorId) -> Result<&mut Body, SimError> {
        self.vehicle
            .as_mut()
            .filter(|b| b.id == id)
            .ok_or(SimError::ActorNotFound(id))
    }

    fn fire_sensors(&mut self) {
        let Some(body) = self.vehicle.as_ref() else {
            return;
        };
        let imu = body.imu();
        let gnss = body.gnss();

        for sensor in &mut self.sensors {
            if self.time + 1e-9 < sensor.next_fire {
                continue;
            }
            let sample = match sensor.kind {
                SensorKind::Camera(spec) => {
                    sensor.next_fire = self.time + spec.sensor_tick;
                    SensorSample::Camera(CameraImage {
                        frame: self.frame,
                        width: spec.width,
                        height: spec.height,
                        raw: Arc::from(Vec::new()),
                    })
                },
                SensorKind::Imu => SensorSample::Imu(imu),
                SensorKind::Gnss => SensorSample::Gnss(gnss),
            };
            (sensor.callback)(sample);
        }
    }
}

impl Simulator for KinematicSimulator {
    fn load_world(&mut self, town: &str) -> Result<(), SimError> {
        if town.is_empty() {
            return Err(SimError::Runtime("empty map name".into()));
        }
        debug!("kinematic simulator: loading {}", town);
        self.world = Some(town.to_string());
        Ok(())
    }

    fn unload_map_layers(&mut self, layers: &[MapLayer]) -> Result<(), SimError> {
        self.unloaded.extend_from_slice(layers);
        Ok(())
    }

    fn spawn_point_count(&self) -> usize {
        self.spawn_points
    }

    fn spawn_vehicle(&mut self, index: usize) -> Result<ActorId, SimError> {
        if index >= self.spawn_points {
            return Err(SimError::InvalidSpawnPoint {
                requested: index,
                available: self.spawn_points,
            });
        }
        if self.vehicle.is_some() {
            return Err(SimError::Runtime("ego vehicle already spawned".into()));
        }
        let id = self.next_actor();
        self.vehicle = Some(Body::new(id, index));
        Ok(id)
    }

    fn physics(&self, vehicle: ActorId) -> Result<PhysicsControl, SimError> {
        Ok(self.body(vehicle)?.physics.clone())
    }

    fn apply_physics(&mut self, vehicle: ActorId, physics: PhysicsControl) -> Result<(), SimError> {
        self.body_mut(vehicle)?.physics = physics;
        Ok(())
    }

    fn spawn_sensor(
        &mut self,
        kind: SensorKind,
        _mount: Transform,
        parent: ActorId,
        callback: SensorCallback,
    ) -> Result<ActorId, SimError> {
        self.body(parent)?;
        let id = self.next_actor();
        self.sensors.push(Sensor {
            id,
            kind,
            callback,
            next_fire: self.time,
        });
        Ok(id)
    }

    fn apply_control(&mut self, vehicle: ActorId, control: VehicleControl) -> Result<(), SimError> {
        self.body_mut(vehicle)?.control = control;
        Ok(())
    }

    fn velocity(&self, vehicle: ActorId) -> Result<Vector3<f64>, SimError> {
        Ok(self.body(vehicle)?.velocity())
    }

    fn step(&mut self, dt: Duration) -> Result<(), SimError> {
        if let Some(budget) = self.step_budget.as_mut() {
            if *budget == 0 {
                return Err(SimError::Runtime("connection to simulator lost".into()));
            }
            *budget -= 1;
        }

        let dt = dt.as_secs_f64();
        if let Some(body) = self.vehicle.as_mut() {
            body.integrate(dt);
        }
        self.time += dt;
        self.frame += 1;
        self.fire_sensors();
        Ok(())
    }

    fn destroy(&mut self, actor: ActorId) -> Result<(), SimError> {
        if let Some(pos) = self.sensors.iter().position(|s| s.id == actor) {
            self.sensors.remove(pos);
        } else if self.vehicle.as_ref().is_some_and(|b| b.id == actor) {
            self.vehicle = None;
        } else {
            return Err(SimError::ActorNotFound(actor));
        }
        self.destroyed.lock().push(actor);
        Ok(())
    }
}

/// 内置模拟器的连接工厂
///
/// 可注入连接失败和运行中断，用于验证会话重启。
pub struct KinematicConnector {
    spawn_points: usize,
    fail_connects: AtomicU32,
    connects: AtomicU32,
    step_budget: Mutex<Option<u64>>,
    destroyed: Arc<Mutex<Vec<ActorId>>>,
}

impl KinematicConnector {
    pub fn new(spawn_points: usize) -> Self {
        Self {
            spawn_points,
            fail_connects: AtomicU32::new(0),
            connects: AtomicU32::new(0),
            step_budget: Mutex::new(None),
            destroyed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 前 `n` 次连接失败
    pub fn fail_connects(self, n: u32) -> Self {
        self.fail_connects.store(n, Ordering::Relaxed);
        self
    }

    /// 下一次连接得到的模拟器在 `steps` 步之后断开
    pub fn drop_after_steps(self, steps: u64) -> Self {
        *self.step_budget.lock() = Some(steps);
        self
    }

    /// 成功建立的连接数
    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::Relaxed)
    }

    /// 所有连接上按顺序销毁的 actor
    pub fn destroyed(&self) -> Vec<ActorId> {
        self.destroyed.lock().clone()
    }
}

impl Default for KinematicConnector {
    fn default() -> Self {
        Self::new(100)
    }
}

impl SimulatorConnector for KinematicConnector {
    fn connect(&self, settings: &SimulatorSettings) -> Result<Box<dyn Simulator>, SimError> {
        let refused = self
            .fail_connects
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(SimError::Connection(format!(
                "{}:{} refused connection",
                settings.host, settings.port
            )));
        }

        self.connects.fetch_add(1, Ordering::Relaxed);
        let mut sim = KinematicSimulator::new(self.spawn_points);
        sim.step_budget = self.step_budget.lock().take();
        sim.destroyed = self.destroyed.clone();
        Ok(Box::new(sim))
    }
}
