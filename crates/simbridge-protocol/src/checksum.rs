//! 帧校验算法

/// 半字节求和校验（EMS16）
///
/// 高半字节保留原位累加后右移 4 位，低半字节直接累加：
///
/// ```text
/// h_sum = Σ (b & 0xF0)
/// l_sum = Σ (b & 0x0F)
/// csum  = (0x10 - (((h_sum >> 4) + l_sum) & 0xF)) & 0xF
/// ```
///
/// 输入必须是校验字段置 0 后的载荷。
///
/// ```
/// use simbridge_protocol::nibble_sum_checksum;
///
/// assert_eq!(nibble_sum_checksum(&[0x30, 0x01, 0, 0, 0, 0, 0, 0]), 0xC);
/// ```
pub fn nibble_sum_checksum(payload: &[u8]) -> u8 {
    let h_sum: u32 = payload.iter().map(|&b| (b & 0xF0) as u32).sum();
    let l_sum: u32 = payload.iter().map(|&b| (b & 0x0F) as u32).sum();
    ((0x10 - (((h_sum >> 4) + l_sum) & 0xF)) & 0xF) as u8
}

/// 位置状态校验（P_STS，2 bit）
///
/// 两个独立的布尔项求和后取低 2 位：
/// `(counter & 0b11 == 0b11) + (counter & 0b1100 == 0b1100)`。
pub fn position_status_checksum(counter: u64) -> u8 {
    let low = (counter & 0b11 == 0b11) as u8;
    let high = (counter & 0b1100 == 0b1100) as u8;
    (low + high) & 0b11
}
