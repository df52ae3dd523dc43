//! 手动控制命令
//!
//! 命令通道传输字符串，语法为 `<tag>[_<payload>]`：
//!
//! | 字符串 | 命令 |
//! |--------|------|
//! | `steer_<f64>` / `throttle_<f64>` / `brake_<f64>` | 手动执行器输入 |
//! | `reverse` | 倒车键（取消巡航并退出接管） |
//! | `cruise_down` / `cruise_up` / `cruise_cancel` | 巡航按键 |
//! | `blinker_left` / `blinker_right` | 切换转向灯 |
//! | `quit` | 结束会话 |

use simbridge_driver::BlinkerSide;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 手动控制命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ManualCommand {
    Steer(f64),
    Throttle(f64),
    Brake(f64),
    Reverse,
    CruiseDown,
    CruiseUp,
    CruiseCancel,
    ToggleBlinker(BlinkerSide),
    Quit,
}

/// 命令解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("Unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("Command {tag} requires a value")]
    MissingValue { tag: &'static str },

    #[error("Invalid value for {tag}: {value:?}")]
    InvalidValue { tag: &'static str, value: String },
}

fn parse_value(tag: &'static str, arg: Option<&str>) -> Result<f64, CommandParseError> {
    let value = arg.ok_or(CommandParseError::MissingValue { tag })?;
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CommandParseError::InvalidValue {
            tag,
            value: value.to_string(),
        })
}

impl FromStr for ManualCommand {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (tag, arg) = match s.split_once('_') {
            Some((tag, arg)) => (tag, Some(arg)),
            None => (s, None),
        };

        match (tag, arg) {
            ("steer", arg) => Ok(ManualCommand::Steer(parse_value("steer", arg)?)),
            ("throttle", arg) => Ok(ManualCommand::Throttle(parse_value("throttle", arg)?)),
            ("brake", arg) => Ok(ManualCommand::Brake(parse_value("brake", arg)?)),
            ("reverse", None) => Ok(ManualCommand::Reverse),
            ("cruise", Some("down")) => Ok(ManualCommand::CruiseDown),
            ("cruise", Some("up")) => Ok(ManualCommand::CruiseUp),
            ("cruise", Some("cancel")) => Ok(ManualCommand::CruiseCancel),
            ("blinker", Some("left")) => Ok(ManualCommand::ToggleBlinker(BlinkerSide::Left)),
            ("blinker", Some("right")) => Ok(ManualCommand::ToggleBlinker(BlinkerSide::Right)),
            ("quit", None) => Ok(ManualCommand::Quit),
            _ => Err(CommandParseError::UnknownCommand(s.to_string())),
        }
    }
}

impl fmt::Display for ManualCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManualCommand::Steer(v) => write!(f, "steer_{}", v),
            ManualCommand::Throttle(v) => write!(f, "throttle_{}", v),
            ManualCommand::Brake(v) => write!(f, "brake_{}", v),
            ManualCommand::Reverse => f.write_str("reverse"),
            ManualCommand::CruiseDown => f.write_str("cruise_down"),
            ManualCommand::CruiseUp => f.write_str("cruise_up"),
            ManualCommand::CruiseCancel => f.write_str("cruise_cancel"),
            ManualCommand::ToggleBlinker(BlinkerSide::Left) => f.write_str("blinker_left"),
            ManualCommand::ToggleBlinker(BlinkerSide::Right) => f.write_str("blinker_right"),
            ManualCommand::Quit => f.write_str("quit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grammar() {
        let cases = [
            ("steer_-0.25", ManualCommand::Steer(-0.25)),
            ("throttle_1", ManualCommand::Throttle(1.0)),
            ("brake_0.5", ManualCommand::Brake(0.5)),
            ("reverse", ManualCommand::Reverse),
            ("cruise_down", ManualCommand::CruiseDown),
            ("cruise_up", ManualCommand::CruiseUp),
            ("cruise_cancel", ManualCommand::CruiseCancel),
            ("blinker_left", ManualCommand::ToggleBlinker(BlinkerSide::Left)),
            ("blinker_right", ManualCommand::ToggleBlinker(BlinkerSide::Right)),
            ("quit", ManualCommand::Quit),
            ("  quit\n", ManualCommand::Quit),
        ];
        for (input, expected) in cases {
            assert_eq!(input.parse::<ManualCommand>().unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn test_display_round_trips() {
        for cmd in [
            ManualCommand::Steer(0.5),
            ManualCommand::CruiseCancel,
            ManualCommand::ToggleBlinker(BlinkerSide::Right),
        ] {
            assert_eq!(cmd.to_string().parse::<ManualCommand>().unwrap(), cmd);
        }
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(
            "throttle".parse::<ManualCommand>(),
            Err(CommandParseError::MissingValue { tag: "throttle" })
        );
        assert_eq!(
            "steer_left".parse::<ManualCommand>(),
            Err(CommandParseError::InvalidValue {
                tag: "steer",
                value: "left".into()
            })
        );
        assert!(matches!(
            "brake_NaN".parse::<ManualCommand>(),
            Err(CommandParseError::InvalidValue { .. })
        ));
        assert!(matches!(
            "cruise_sideways".parse::<ManualCommand>(),
            Err(CommandParseError::UnknownCommand(_))
        ));
        assert!(matches!(
            "honk".parse::<ManualCommand>(),
            Err(CommandParseError::UnknownCommand(_))
        ));
        assert!(matches!(
            "quit_now".parse::<ManualCommand>(),
            Err(CommandParseError::UnknownCommand(_))
        ));
    }
}
