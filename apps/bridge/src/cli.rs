//! 命令行参数与配置合并

use anyhow::{Context, Result};
use clap::Parser;
use simbridge_control::BridgeConfig;
use std::path::{Path, PathBuf};

/// Simulator ↔ driving-stack bridge
#[derive(Parser, Debug, Default)]
#[command(name = "simbridge")]
#[command(about = "Bridge between a driving simulator and an autonomous-driving stack", long_about = None)]
#[command(version)]
pub struct Args {
    /// 配置文件（默认 `<config_dir>/simbridge/config.toml`，不存在时使用默认配置）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 地图名
    #[arg(long)]
    pub town: Option<String>,

    /// 出生点序号
    #[arg(long)]
    pub spawn_point: Option<usize>,

    /// 卸载植被、建筑等图层
    #[arg(long)]
    pub low_quality: bool,

    /// 驾驶栈使用端到端（无车道线）模式
    #[arg(long)]
    pub laneless: bool,

    /// SocketCAN 接口，按总线编号顺序重复指定（如 `--iface can0 --iface can1`）
    #[arg(long = "iface")]
    pub interfaces: Vec<String>,

    /// 把发布给驾驶栈的消息以 JSON 行输出到 stdout
    #[arg(long)]
    pub echo: bool,
}

fn default_config_file() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push("simbridge");
    path.push("config.toml");
    Some(path)
}

fn load_file(path: &Path) -> Result<BridgeConfig> {
    BridgeConfig::load(path).with_context(|| format!("Failed to load config from {}", path.display()))
}

impl Args {
    /// 读取配置文件并叠加命令行覆盖项
    pub fn resolve_config(&self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => load_file(path)?,
            None => match default_config_file() {
                Some(path) if path.exists() => load_file(&path)?,
                _ => BridgeConfig::default(),
            },
        };
        self.apply_overrides(&mut config);
        config.validate().context("Invalid configuration after command-line overrides")?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut BridgeConfig) {
        if let Some(town) = &self.town {
            config.simulator.town = town.clone();
        }
        if let Some(spawn_point) = self.spawn_point {
            config.simulator.spawn_point = spawn_point;
        }
        if self.low_quality {
            config.simulator.low_quality = true;
        }
        if self.laneless {
            config.stack.laneless = true;
        }
        if !self.interfaces.is_empty() {
            config.can.interfaces = self.interfaces.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_flags() {
        let args = Args::parse_from([
            "simbridge",
            "--town",
            "Town06",
            "--spawn-point",
            "3",
            "--low-quality",
            "--iface",
            "vcan0",
            "--iface",
            "vcan1",
        ]);
        assert_eq!(args.town.as_deref(), Some("Town06"));
        assert_eq!(args.spawn_point, Some(3));
        assert!(args.low_quality);
        assert!(!args.laneless);
        assert_eq!(args.interfaces, vec!["vcan0", "vcan1"]);
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[simulator]\ntown = \"Town01\"\nspawn_point = 4\n\n[can]\ninterfaces = [\"can0\"]"
        )
        .unwrap();

        let args = Args {
            config: Some(file.path().to_path_buf()),
            spawn_point: Some(7),
            laneless: true,
            ..Args::default()
        };
        let config = args.resolve_config().unwrap();
        assert_eq!(config.simulator.town, "Town01");
        assert_eq!(config.simulator.spawn_point, 7);
        assert!(config.stack.laneless);
        assert_eq!(config.can.interfaces, vec!["can0"]);
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let args = Args {
            config: Some(PathBuf::from("/nonexistent/simbridge.toml")),
            ..Args::default()
        };
        assert!(args.resolve_config().is_err());
    }
}
