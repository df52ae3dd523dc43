//! 报文地址常量
//!
//! 地址与总线编号共同确定一帧的含义。

// ============================================================================
// 出站周期帧（桥接器 → 硬件）
// ============================================================================

/// 发动机状态 (EMS16)，100Hz
pub const ID_EMS16: u32 = 0x260;

/// 发动机车速 (EMS_366)，100Hz
pub const ID_EMS366: u32 = 0x366;

/// 仪表盘 (CLU11)，50Hz
pub const ID_CLU11: u32 = 0x4F1;

/// 挡位/位置状态 (P_STS)，50Hz
pub const ID_P_STS: u32 = 0x470;

// ============================================================================
// 入站方向盘反馈（硬件 → 桥接器）
// ============================================================================

/// 方向盘转角传感器 (SAS11)
pub const ID_SAS11: u32 = 0x2B0;

/// 转向助力扭矩 (MDPS12)
pub const ID_MDPS12: u32 = 0x251;

/// 方向盘反馈所在总线
pub const STEERING_FEEDBACK_BUS: u8 = 0;

// ============================================================================
// 车辆状态帧（桥接器 → 驾驶栈）
// ============================================================================

/// 轮速 (WHL_SPD11)
pub const ID_WHL_SPD11: u32 = 0x386;

/// 网关灯光 (CGW1)
pub const ID_CGW1: u32 = 0x541;

/// 巡航主开关 (SCC11)
pub const ID_SCC11: u32 = 0x420;

/// 巡航控制状态 (SCC12)
pub const ID_SCC12: u32 = 0x421;
