//! 手动命令输入
//!
//! 从 stdin 逐行读取。每行可以是完整命令（`throttle_0.5`），
//! 也可以是单键快捷方式：
//!
//! | 键 | 命令 |
//! |----|------|
//! | `w` / `s` | 油门 / 刹车 |
//! | `a` / `d` | 左转 / 右转 |
//! | `r` | 倒车键 |
//! | `1` / `2` / `3` | 巡航加速 / 巡航设定 / 取消巡航 |
//! | `z` / `x` | 左 / 右转向灯 |
//! | `q` | 退出 |

use crossbeam_channel::Sender;
use std::io::BufRead;
use std::thread;
use tracing::{debug, info};

/// 单键快捷方式展开为命令字符串
pub fn expand_shortcut(line: &str) -> &str {
    match line {
        "w" => "throttle_1.0",
        "s" => "brake_1.0",
        "a" => "steer_0.15",
        "d" => "steer_-0.15",
        "r" => "reverse",
        "1" => "cruise_up",
        "2" => "cruise_down",
        "3" => "cruise_cancel",
        "z" => "blinker_left",
        "x" => "blinker_right",
        "q" => "quit",
        other => other,
    }
}

/// 读取 `reader` 直到 EOF，把每条非空命令送入通道
///
/// 返回送出的命令数。通道关闭时提前返回。
pub fn pump_commands<R: BufRead>(reader: R, tx: &Sender<String>) -> usize {
    let mut sent = 0;
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if tx.send(expand_shortcut(line).to_string()).is_err() {
            debug!("command channel closed, stopping input");
            break;
        }
        sent += 1;
    }
    sent
}

/// 后台线程读取 stdin
pub fn spawn_stdin_reader(tx: Sender<String>) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new().name("stdin".into()).spawn(move || {
        let stdin = std::io::stdin();
        let sent = pump_commands(stdin.lock(), &tx);
        info!("stdin closed after {} commands", sent);
    })
}
