//! 单次桥接会话
//!
//! 建立 → 控制循环 → 拆除：
//!
//! 1. 连接模拟器，加载地图，校验出生点，生成自车并调校物理参数
//! 2. 生成摄像头/IMU/GPS，回调交给 [`SensorRelay`]
//! 3. 打开总线设备，按顺序启动后台线程：
//!    `device_state`、`peripheral_state`、`driver_monitoring`、`carstate`、`sendcan`
//! 4. 固定频率控制循环，直到收到退出命令或后台线程异常退出
//! 5. 取消并逆序 join 后台线程，再按生成的逆序销毁 actor
//!
//! 每次 [`BridgeSession::run`] 都从零开始，不继承上一次会话的状态。

use crate::arbiter::ControlArbiter;
use crate::command::ManualCommand;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::sensors::SensorRelay;
use crate::sim::{
    ActorId, CameraSpec, LOW_QUALITY_LAYERS, SensorKind, SimError, Simulator, SimulatorConnector, SimulatorSettings,
    Transform,
};
use crossbeam_channel::Receiver;
use simbridge_can::{CanDevice, CanError};
use simbridge_driver::{
    BridgeContext, BridgeMetrics, CancellationToken, MetricsSnapshot, RateKeeper, StackBus, VehicleState, WorkerSet,
    carstate_loop, device_state_loop, driver_monitoring_loop, peripheral_state_loop, sendcan_loop,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 总线设备工厂，每次会话打开一个新设备
pub type DeviceFactory = Box<dyn Fn() -> Result<Box<dyn CanDevice>, CanError> + Send + Sync>;

/// 会话结果
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    /// 控制循环执行的拍数
    pub ticks: u64,
    /// 接管状态序列：初始值和之后每次变化
    pub engagement_history: Vec<bool>,
    /// 按 join 顺序的后台线程名
    pub joined_workers: Vec<String>,
    /// 是否因退出命令结束
    pub quit: bool,
    /// 从发出取消到全部后台线程 join 完成的耗时
    pub shutdown_time: Duration,
    pub metrics: MetricsSnapshot,
}

/// 桥接会话
pub struct BridgeSession {
    config: BridgeConfig,
    connector: Arc<dyn SimulatorConnector>,
    devices: DeviceFactory,
    bus: Arc<dyn StackBus>,
    commands: Receiver<String>,
    metrics: Arc<BridgeMetrics>,
}

impl BridgeSession {
    pub fn new(
        config: BridgeConfig,
        connector: Arc<dyn SimulatorConnector>,
        devices: DeviceFactory,
        bus: Arc<dyn StackBus>,
        commands: Receiver<String>,
    ) -> Self {
        Self {
            config,
            connector,
            devices,
            bus,
            commands,
            metrics: Arc::new(BridgeMetrics::new()),
        }
    }

    /// 跨会话累计的指标
    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// 运行一次完整会话
    ///
    /// 配置无效时在连接模拟器之前返回 [`BridgeError::Config`]。
    pub fn run(&self) -> Result<SessionSummary, BridgeError> {
        self.config.validate()?;

        let sim_cfg = &self.config.simulator;
        let settings = SimulatorSettings {
            host: sim_cfg.host.clone(),
            port: sim_cfg.port,
            timeout: Duration::from_millis(sim_cfg.timeout_ms),
        };
        let mut sim = self.connector.connect(&settings)?;
        info!("Connected to simulator at {}:{}", settings.host, settings.port);

        let mut actors = Vec::new();
        let result = self.drive(sim.as_mut(), &mut actors);

        // 后台线程此时已全部退出
        for actor in actors.iter().rev() {
            match sim.destroy(*actor) {
                Ok(()) => debug!("destroyed actor {:?}", actor),
                Err(e) => warn!("Failed to destroy actor {:?}: {}", actor, e),
            }
        }

        result.map(|mut summary| {
            summary.metrics = self.metrics.snapshot();
            summary
        })
    }

    fn drive(&self, sim: &mut dyn Simulator, actors: &mut Vec<ActorId>) -> Result<SessionSummary, BridgeError> {
        let cfg = &self.config;
        info!(
            "Stack flags: laneless={}, disable_radar={}",
            cfg.stack.laneless, cfg.stack.disable_radar
        );

        sim.load_world(&cfg.simulator.town)?;
        if cfg.simulator.low_quality {
            sim.unload_map_layers(&LOW_QUALITY_LAYERS)?;
        }

        let available = sim.spawn_point_count();
        let requested = cfg.simulator.spawn_point;
        if requested >= available {
            error!("Spawn point {} out of range, {} available", requested, available);
            return Err(SimError::InvalidSpawnPoint { requested, available }.into());
        }

        let vehicle = sim.spawn_vehicle(requested)?;
        actors.push(vehicle);

        let physics = sim.physics(vehicle)?;
        let max_steer_angle = physics
            .max_steer_angle()
            .ok_or_else(|| SimError::Runtime("vehicle has no wheels".into()))?;
        sim.apply_physics(vehicle, physics.tuned())?;

        let ctx = Arc::new(BridgeContext::new());
        let camera = CameraSpec::default();
        let relay = Arc::new(SensorRelay::new(self.bus.clone(), ctx.clone(), &camera));
        let mount = Transform::sensor_mount();
        for kind in [SensorKind::Camera(camera), SensorKind::Imu, SensorKind::Gnss] {
            actors.push(sim.spawn_sensor(kind, mount, vehicle, relay.callback())?);
        }
        info!(
            "Spawned vehicle {:?} at spawn point {} (max steer angle {:.1}°)",
            vehicle, requested, max_steer_angle
        );

        let device = (self.devices)()?;
        let mut workers = WorkerSet::new(CancellationToken::new());
        self.spawn_workers(&mut workers, device, &ctx)?;
        info!("Started {} workers: {:?}", workers.len(), workers.names());

        let outcome = self.control_loop(sim, vehicle, max_steer_angle, &ctx, &workers);
        let shutdown_started = Instant::now();
        let report = workers.shutdown();
        let shutdown_time = shutdown_started.elapsed();
        debug!("workers joined in {:?}", shutdown_time);

        let mut summary = outcome?;
        summary.shutdown_time = shutdown_time;
        if summary.quit {
            if !report.is_clean() {
                warn!("{} workers failed during shutdown", report.failures.len());
            }
            summary.joined_workers = report.joined;
        } else {
            summary.joined_workers = report
                .into_result()
                .inspect_err(|e| error!("Session ended by worker failure: {}", e))?;
        }
        Ok(summary)
    }

    fn spawn_workers(
        &self,
        workers: &mut WorkerSet,
        device: Box<dyn CanDevice>,
        ctx: &Arc<BridgeContext>,
    ) -> Result<(), BridgeError> {
        let telemetry = self.config.telemetry_config();
        let transceiver = self.config.transceiver_config();
        let cancel = workers.cancel_token().clone();

        {
            let (bus, cancel, metrics) = (self.bus.clone(), cancel.clone(), self.metrics.clone());
            workers.spawn("device_state", move || {
                device_state_loop(bus, telemetry.device_period, cancel, metrics)
            })?;
        }
        {
            let (bus, cancel, metrics) = (self.bus.clone(), cancel.clone(), self.metrics.clone());
            workers.spawn("peripheral_state", move || {
                peripheral_state_loop(bus, telemetry.peripheral_period, cancel, metrics)
            })?;
        }
        {
            let (bus, cancel, metrics) = (self.bus.clone(), cancel.clone(), self.metrics.clone());
            workers.spawn("driver_monitoring", move || {
                driver_monitoring_loop(bus, telemetry.driver_monitoring_period, cancel, metrics)
            })?;
        }
        {
            let (bus, ctx, cancel, metrics) = (self.bus.clone(), ctx.clone(), cancel.clone(), self.metrics.clone());
            workers.spawn("carstate", move || {
                carstate_loop(bus, ctx, transceiver.period, cancel, metrics)
            })?;
        }
        {
            let (bus, ctx, metrics) = (self.bus.clone(), ctx.clone(), self.metrics.clone());
            workers.spawn("sendcan", move || {
                sendcan_loop(device, bus, ctx, transceiver, cancel, metrics)
            })?;
        }
        Ok(())
    }

    /// 每拍至多取一条命令，无法解析的丢弃
    fn poll_command(&self) -> Option<ManualCommand> {
        let line = self.commands.try_recv().ok()?;
        match line.parse() {
            Ok(command) => Some(command),
            Err(e) => {
                debug!("Ignoring command {:?}: {}", line, e);
                None
            },
        }
    }

    fn control_loop(
        &self,
        sim: &mut dyn Simulator,
        vehicle: ActorId,
        max_steer_angle: f64,
        ctx: &BridgeContext,
        workers: &WorkerSet,
    ) -> Result<SessionSummary, BridgeError> {
        let control = &self.config.control;
        let mut arbiter = ControlArbiter::new(control.clone());
        let mut rk = RateKeeper::new("bridge", control.rate_hz, Some(self.config.print_delay_threshold()));
        let mut summary = SessionSummary {
            engagement_history: vec![arbiter.engaged()],
            ..SessionSummary::default()
        };

        loop {
            if workers.cancel_token().is_cancelled() || workers.any_finished() {
                warn!("Background worker stopped, ending session");
                break;
            }

            let command = self.poll_command();
            if command.is_some() {
                self.metrics.commands_processed.fetch_add(1, Ordering::Relaxed);
            }
            let actual_angle = self.bus.car_state().map(|s| s.steering_angle_deg).unwrap_or(0.0);
            let out = arbiter.step(command, actual_angle, self.bus.car_control(), max_steer_angle);

            sim.apply_control(vehicle, out.control)?;
            sim.step(rk.interval())?;
            let velocity = sim.velocity(vehicle)?;

            ctx.publish_vehicle(VehicleState {
                speed_mps: velocity.norm(),
                steering_angle_deg: out.steer_deg,
                heading_deg: ctx.heading.load(),
                velocity,
                engaged: out.engaged,
                cruise_button: out.cruise_button,
                blinkers: out.blinkers,
            });

            if summary.engagement_history.last() != Some(&out.engaged) {
                info!("engaged: {}", out.engaged);
                summary.engagement_history.push(out.engaged);
            }
            summary.ticks += 1;
            self.metrics.ticks.fetch_add(1, Ordering::Relaxed);

            if rk.frame() % control.print_decimation == 0 {
                info!(
                    "frame {}: engaged: {}; throttle: {:.3}; steer(c/deg): {:.3} {:.3}; brake: {:.3}; blinkers: L={} R={}",
                    rk.frame(),
                    out.engaged,
                    out.control.throttle,
                    out.control.steer,
                    out.steer_deg,
                    out.control.brake,
                    out.blinkers.left,
                    out.blinkers.right
                );
            }

            if out.quit {
                info!("Quit requested after {} ticks", summary.ticks);
                summary.quit = true;
                break;
            }

            if rk.keep_time() {
                self.metrics.lagged_ticks.fetch_add(1, Ordering::Relaxed);
            }
        }

        Ok(summary)
    }
}
