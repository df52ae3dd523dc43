//! 协议层属性测试

use proptest::prelude::*;
use simbridge_protocol::outbound::{Ems16, engine_status};
use simbridge_protocol::*;

fn receiver_sum(payload: &[u8]) -> u32 {
    let h: u32 = payload.iter().map(|&b| (b & 0xF0) as u32).sum();
    let l: u32 = payload.iter().map(|&b| (b & 0x0F) as u32).sum();
    ((h >> 4) + l) & 0xF
}

proptest! {
    /// 校验值与公式逐位一致
    #[test]
    fn nibble_checksum_matches_formula(payload in prop::array::uniform8(any::<u8>())) {
        let h: u32 = payload.iter().map(|&b| (b >> 4) as u32).sum::<u32>() << 4;
        let l: u32 = payload.iter().map(|&b| (b & 0x0F) as u32).sum();
        let expected = ((0x10 - (((h >> 4) + l) & 0xF)) & 0xF) as u8;

        let csum = nibble_sum_checksum(&payload);
        prop_assert_eq!(csum, expected);
        prop_assert!(csum < 0x10);
    }

    /// 校验写回低半字节后，接收端的半字节和为 0
    #[test]
    fn nibble_checksum_closes_the_sum(mut payload in prop::array::uniform8(any::<u8>())) {
        payload[7] &= 0xF0;
        let csum = nibble_sum_checksum(&payload);
        payload[7] |= csum;
        prop_assert_eq!(receiver_sum(&payload), 0);
    }

    /// EMS16 对任意帧序号和状态码都满足接收端校验
    #[test]
    fn engine_status_frame_verifies(tick in any::<u64>(), status in 0u8..8) {
        let frame = engine_status(tick, status);
        prop_assert_eq!(receiver_sum(&frame.data), 0);

        let msg = Ems16::from(u64::from_le_bytes(frame.data));
        prop_assert_eq!(msg.alive_counter().value() as u64, tick % 4);
        prop_assert_eq!(msg.eng_stat().value(), status);
    }

    /// P_STS 校验只取 0..=2
    #[test]
    fn position_checksum_in_range(counter in any::<u64>()) {
        prop_assert!(position_status_checksum(counter) <= 2);
    }

    /// 计数值始终等于 tick % modulus
    #[test]
    fn rolling_counter_is_tick_modulo(tick in any::<u64>(), bits in 1u32..=8) {
        let counter = RollingCounter::new(bits);
        prop_assert_eq!(counter.at(tick) as u64, tick % (1u64 << bits));
    }
}

#[test]
fn cluster_counter_sequence_over_batches() {
    let synth = FrameSynthesizer::default();
    let counters: Vec<u8> = (0..40u64)
        .filter_map(|tick| {
            synth
                .synthesize(tick, 0.0)
                .iter()
                .find(|f| f.address == ID_CLU11)
                .map(|f| f.data[3] >> 4)
        })
        .collect();

    let expected: Vec<u8> = (0..20u8).map(|i| i % 16).collect();
    assert_eq!(counters, expected);
}
