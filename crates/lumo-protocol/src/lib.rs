//! # Lumo Protocol
//!
//! SO-101 机械臂 Feetech STS 串口总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `joint`: 关节命名（封闭枚举）与定长关节数组
//! - `register`: 舵机寄存器表
//! - `packet`: 指令包构建 / 状态包解析
//! - `units`: 原始编码器值与工程单位（度 / 百分比）互相转换
//!
//! ## 字节序
//!
//! Feetech STS 协议使用小端字节序（低字节在前）。

pub mod joint;
pub mod packet;
pub mod register;
pub mod units;

// 重新导出常用类型
pub use joint::{ArmRole, JOINT_COUNT, JointArray, JointName};
pub use packet::{BROADCAST_ID, Instruction, StatusPacket, checksum};
pub use register::Register;
pub use units::{MAX_RESOLUTION, NormMode, RawRange};

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 包头不是 `FF FF`
    #[error("Invalid packet header: {0:02X?}")]
    InvalidHeader([u8; 2]),

    /// 包长度不匹配
    #[error("Invalid packet length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// 校验和错误
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// 应答来自非预期的舵机
    #[error("Unexpected servo id: expected {expected}, got {actual}")]
    UnexpectedId { expected: u8, actual: u8 },

    /// 舵机在状态包中报告了错误位
    #[error("Servo {id} reported error status 0b{status:08b}")]
    ServoStatus { id: u8, status: u8 },

    /// 未知寄存器名称
    #[error("Unknown register: {0}")]
    UnknownRegister(String),

    /// 未知关节名称
    #[error("Unknown joint: {0}")]
    UnknownJoint(String),

    /// 指令包参数超出协议允许的最大长度
    #[error("Packet too long: {0} bytes")]
    PacketTooLong(usize),
}
