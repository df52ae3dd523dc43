//! # simbridge
//!
//! 模拟器与自动驾驶软件栈之间的桥接程序。
//!
//! ```bash
//! # 无硬件：内置运动学模拟器 + Mock 总线设备
//! simbridge
//!
//! # 接实体方向盘/总线
//! simbridge --iface can0 --iface can1 --spawn-point 3
//! ```
//!
//! 运行时从 stdin 读取手动命令（见 `input` 模块），Ctrl-C 等同于 `quit`。

use anyhow::{Context, Result};
use clap::Parser;
use simbridge_can::{CanDevice, MockCanDevice};
use simbridge_control::sim::KinematicConnector;
use simbridge_control::{BridgeConfig, BridgeSession, DeviceFactory, run_with_restarts};
use simbridge_driver::{LocalBus, StackMessage};
use std::sync::Arc;
use std::thread;
use tracing::{error, info, warn};

mod cli;
mod input;

use cli::Args;

fn device_factory(config: &BridgeConfig) -> Result<DeviceFactory> {
    let interfaces = config.can.interfaces.clone();
    if interfaces.is_empty() {
        info!("No CAN interfaces configured, using mock device");
        return Ok(Box::new(|| Ok(Box::new(MockCanDevice::new()) as Box<dyn CanDevice>)));
    }

    #[cfg(target_os = "linux")]
    {
        info!("Using SocketCAN interfaces {:?}", interfaces);
        return Ok(Box::new(move || {
            let device = simbridge_can::SocketCanDevice::open(&interfaces)?;
            Ok(Box::new(device) as Box<dyn CanDevice>)
        }));
    }

    #[cfg(not(target_os = "linux"))]
    {
        anyhow::bail!("SocketCAN interfaces {:?} require Linux", interfaces);
    }
}

/// 驾驶栈消息以 JSON 行输出
fn spawn_echo(bus: &LocalBus) -> Result<thread::JoinHandle<()>> {
    let rx = bus.subscribe();
    thread::Builder::new()
        .name("echo".into())
        .spawn(move || {
            for msg in rx.iter() {
                if matches!(msg, StackMessage::Can(_)) {
                    continue;
                }
                match serde_json::to_string(&msg) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Failed to encode {}: {}", msg.service(), e),
                }
            }
        })
        .context("Failed to spawn echo thread")
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("simbridge=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = args.resolve_config()?;
    info!(
        "Starting bridge: town={}, spawn_point={}, low_quality={}",
        config.simulator.town, config.simulator.spawn_point, config.simulator.low_quality
    );

    let (tx, rx) = crossbeam_channel::unbounded::<String>();

    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        info!("Received interrupt signal, shutting down...");
        let _ = ctrlc_tx.send("quit".to_string());
    })
    .context("Failed to set signal handler")?;

    input::spawn_stdin_reader(tx).context("Failed to spawn stdin reader")?;

    let bus = Arc::new(LocalBus::new());
    if args.echo {
        spawn_echo(&bus)?;
    }

    let policy = config.retry_policy();
    let devices = device_factory(&config)?;
    let session = BridgeSession::new(
        config,
        Arc::new(KinematicConnector::default()),
        devices,
        bus.clone(),
        rx,
    );

    match run_with_restarts(policy, |attempt| {
        if attempt > 1 {
            info!("Bridge attempt {}/{}", attempt, policy.max_attempts);
        }
        session.run()
    }) {
        Ok(summary) => {
            let m = summary.metrics;
            info!(
                "Bridge stopped after {} ticks ({:.2}% lagged), {} frames sent, {} send errors, {} dropped stack messages",
                summary.ticks,
                m.lag_rate(),
                m.frames_sent,
                m.send_errors,
                bus.dropped()
            );
            Ok(())
        },
        Err(e) => {
            error!("Bridge failed: {}", e);
            Err(e).context("Bridge terminated")
        },
    }
}
