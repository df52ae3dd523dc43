//! 内存 Mock 设备
//!
//! 克隆得到的句柄共享同一份状态：一份交给收发线程，另一份留在测试中
//! 注入入站帧、检查已发送的批次。

use crate::{BusFrame, CanDevice, CanDeviceError, CanDeviceErrorKind, CanError, SafetyMode};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// 单次 `recv` 返回的最大帧数（模拟硬件分块读取）
pub const MOCK_RECV_CHUNK: usize = 64;

#[derive(Debug, Default)]
struct MockState {
    safety_mode: SafetyMode,
    sent_batches: Vec<Vec<BusFrame>>,
    inbound: VecDeque<BusFrame>,
    fail_sends: bool,
    device_lost: bool,
    recv_calls: usize,
}

/// 共享状态的 Mock 设备
#[derive(Debug, Clone, Default)]
pub struct MockCanDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockCanDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注入入站帧
    pub fn push_inbound(&self, frames: impl IntoIterator<Item = BusFrame>) {
        self.state.lock().inbound.extend(frames);
    }

    /// 已发送的批次（每次 `send_many` 一个）
    pub fn sent_batches(&self) -> Vec<Vec<BusFrame>> {
        self.state.lock().sent_batches.clone()
    }

    /// 取走已发送的批次
    pub fn take_sent_batches(&self) -> Vec<Vec<BusFrame>> {
        std::mem::take(&mut self.state.lock().sent_batches)
    }

    /// 待读入站帧数
    pub fn pending_inbound(&self) -> usize {
        self.state.lock().inbound.len()
    }

    /// `recv` 被调用的次数
    pub fn recv_calls(&self) -> usize {
        self.state.lock().recv_calls
    }

    pub fn safety_mode(&self) -> SafetyMode {
        self.state.lock().safety_mode
    }

    /// 让后续发送失败（模拟设备 IO 错误）
    pub fn set_send_failure(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    /// 模拟设备拔出：后续收发返回致命错误
    pub fn set_device_lost(&self, lost: bool) {
        self.state.lock().device_lost = lost;
    }
}

fn unplugged() -> CanError {
    CanDeviceError::new(CanDeviceErrorKind::NoDevice, "mock device unplugged").into()
}

impl CanDevice for MockCanDevice {
    fn set_safety_mode(&mut self, mode: SafetyMode) -> Result<(), CanError> {
        self.state.lock().safety_mode = mode;
        Ok(())
    }

    fn send_many(&mut self, frames: &[BusFrame]) -> Result<(), CanError> {
        let mut state = self.state.lock();
        if state.device_lost {
            return Err(unplugged());
        }
        if state.safety_mode != SafetyMode::AllOutput {
            return Err(CanError::OutputDisabled(state.safety_mode));
        }
        if state.fail_sends {
            return Err(CanError::Io(std::io::Error::other("mock send failure")));
        }
        state.sent_batches.push(frames.to_vec());
        Ok(())
    }

    fn recv(&mut self, out: &mut Vec<BusFrame>) -> Result<usize, CanError> {
        let mut state = self.state.lock();
        state.recv_calls += 1;
        if state.device_lost {
            return Err(unplugged());
        }
        let n = state.inbound.len().min(MOCK_RECV_CHUNK);
        out.extend(state.inbound.drain(..n));
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_requires_all_output() {
        let mut dev = MockCanDevice::new();
        let frame = BusFrame::new(0x260, 0, &[0; 8]);
        assert!(matches!(
            dev.send_many(&[frame]),
            Err(CanError::OutputDisabled(SafetyMode::Silent))
        ));

        dev.set_safety_mode(SafetyMode::AllOutput).unwrap();
        dev.send_many(&[frame, frame]).unwrap();
        assert_eq!(dev.sent_batches(), vec![vec![frame, frame]]);
    }

    #[test]
    fn test_recv_returns_chunks_until_empty() {
        let mut dev = MockCanDevice::new();
        let handle = dev.clone();
        handle.push_inbound((0..100).map(|i| BusFrame::new(i, 0, &[])));

        let mut out = Vec::new();
        assert_eq!(dev.recv(&mut out).unwrap(), MOCK_RECV_CHUNK);
        assert_eq!(dev.recv(&mut out).unwrap(), 100 - MOCK_RECV_CHUNK);
        assert_eq!(dev.recv(&mut out).unwrap(), 0);
        assert_eq!(out.len(), 100);
        assert_eq!(handle.recv_calls(), 3);
    }

    #[test]
    fn test_send_failure_injection() {
        let mut dev = MockCanDevice::new();
        dev.set_safety_mode(SafetyMode::AllOutput).unwrap();
        dev.set_send_failure(true);
        assert!(matches!(dev.send_many(&[]), Err(CanError::Io(_))));
        assert!(dev.sent_batches().is_empty());
    }

    #[test]
    fn test_device_lost_is_fatal() {
        let mut dev = MockCanDevice::new();
        dev.set_safety_mode(SafetyMode::AllOutput).unwrap();
        dev.set_device_lost(true);
        assert!(dev.send_many(&[]).unwrap_err().is_fatal());
        assert!(dev.recv(&mut Vec::new()).unwrap_err().is_fatal());
    }
}
