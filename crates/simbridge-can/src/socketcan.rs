//! SocketCAN 后端
//!
//! 每条总线对应一个 SocketCAN 接口（`bus` 即接口列表下标），
//! 所有套接字以非阻塞模式打开，`recv` 轮询全部接口直到 `WouldBlock`。

use crate::{BusFrame, CanDevice, CanDeviceError, CanDeviceErrorKind, CanError, SafetyMode};
use ::socketcan::{CanFrame, CanSocket, EmbeddedFrame, Id, Socket, StandardId};
use std::io::ErrorKind;
use tracing::{debug, info, trace};

/// 单次 `recv` 最多读取的帧数，避免总线洪峰时长时间占用
const MAX_RECV_PER_CALL: usize = 256;

/// SocketCAN 设备
pub struct SocketCanDevice {
    interfaces: Vec<String>,
    sockets: Vec<CanSocket>,
    safety_mode: SafetyMode,
}

impl SocketCanDevice {
    /// 打开接口列表，下标即总线编号
    pub fn open<S: AsRef<str>>(interfaces: &[S]) -> Result<Self, CanError> {
        let mut names = Vec::with_capacity(interfaces.len());
        let mut sockets = Vec::with_capacity(interfaces.len());

        for iface in interfaces {
            let iface = iface.as_ref();
            let socket = CanSocket::open(iface).map_err(|e| {
                let kind = match e.kind() {
                    ErrorKind::NotFound => CanDeviceErrorKind::NotFound,
                    ErrorKind::PermissionDenied => CanDeviceErrorKind::AccessDenied,
                    _ => CanDeviceErrorKind::Backend,
                };
                CanDeviceError::new(kind, format!("{}: {}", iface, e))
            })?;
            socket.set_nonblocking(true)?;

            info!("SocketCAN interface {} opened as bus {}", iface, sockets.len());
            names.push(iface.to_string());
            sockets.push(socket);
        }

        Ok(Self {
            interfaces: names,
            sockets,
            safety_mode: SafetyMode::Silent,
        })
    }

    /// 接口名列表
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    fn to_socketcan(frame: &BusFrame) -> Result<CanFrame, CanError> {
        let id = u16::try_from(frame.address)
            .ok()
            .and_then(StandardId::new)
            .ok_or_else(|| {
                CanDeviceError::new(
                    CanDeviceErrorKind::InvalidFrame,
                    format!("address 0x{:X} is not a standard id", frame.address),
                )
            })?;

        CanFrame::new(id, frame.data_slice()).ok_or_else(|| {
            CanDeviceError::new(CanDeviceErrorKind::InvalidFrame, format!("bad payload for {}", frame))
                .into()
        })
    }
}

fn resolve_frame(frame: &BusFrame, bus_count: usize) -> Result<(usize, CanFrame), CanError> {
    let bus = frame.bus as usize;
    if bus >= bus_count {
        return Err(CanError::UnknownBus(frame.bus));
    }
    Ok((bus, SocketCanDevice::to_socketcan(frame)?))
}

/// 写入前先把整批帧映射到 (接口下标, 帧)
///
/// 没有接口的总线和无法编码的帧被丢弃，其余保持原顺序。
fn resolve_batch(frames: &[BusFrame], bus_count: usize) -> Vec<(usize, CanFrame)> {
    frames
        .iter()
        .filter_map(|frame| match resolve_frame(frame, bus_count) {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                trace!("dropping {}: {}", frame, e);
                None
            },
        })
        .collect()
}

impl CanDevice for SocketCanDevice {
    fn set_safety_mode(&mut self, mode: SafetyMode) -> Result<(), CanError> {
        debug!("SocketCAN safety mode: {:?} -> {:?}", self.safety_mode, mode);
        self.safety_mode = mode;
        Ok(())
    }

    fn send_many(&mut self, frames: &[BusFrame]) -> Result<(), CanError> {
        if self.safety_mode != SafetyMode::AllOutput {
            return Err(CanError::OutputDisabled(self.safety_mode));
        }

        for (bus, can_frame) in resolve_batch(frames, self.sockets.len()) {
            self.sockets[bus].write_frame(&can_frame)?;
        }
        Ok(())
    }

    fn recv(&mut self, out: &mut Vec<BusFrame>) -> Result<usize, CanError> {
        let mut count = 0;

        for (bus, socket) in self.sockets.iter().enumerate() {
            while count < MAX_RECV_PER_CALL {
                let frame = match socket.read_frame() {
                    Ok(frame) => frame,
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) => return Err(e.into()),
                };

                if let CanFrame::Error(_) = frame {
                    trace!("bus {}: error frame skipped", bus);
                    continue;
                }

                let address = match frame.id() {
                    Id::Standard(id) => id.as_raw() as u32,
                    Id::Extended(id) => id.as_raw(),
                };
                out.push(BusFrame::new(address, bus as u8, frame.data()));
                count += 1;
            }
        }

        Ok(count)
    }
}
