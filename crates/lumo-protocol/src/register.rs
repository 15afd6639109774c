//! 舵机寄存器表（STS3215 控制表中本项目用到的部分）

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// 命名寄存器
///
/// 名称与 LeRobot `FeetechMotorsBus` 中的寄存器名保持一致，
/// 便于与外部遥操作 / 录制进程共享同一套标定文件。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// 扭矩使能（0 = 释放，1 = 使能）
    TorqueEnable,
    /// 加速度（原始值 0..=254）
    Acceleration,
    /// 目标位置
    GoalPosition,
    /// 运行速度上限（步/秒，0 = 不限速）
    GoalVelocity,
    /// EEPROM 锁标志
    Lock,
    /// 当前位置
    PresentPosition,
}

impl Register {
    /// 控制表地址
    pub const fn address(self) -> u8 {
        match self {
            Register::TorqueEnable => 40,
            Register::Acceleration => 41,
            Register::GoalPosition => 42,
            Register::GoalVelocity => 46,
            Register::Lock => 55,
            Register::PresentPosition => 56,
        }
    }

    /// 数据宽度（字节）
    pub const fn size(self) -> u8 {
        match self {
            Register::TorqueEnable | Register::Acceleration | Register::Lock => 1,
            Register::GoalPosition | Register::GoalVelocity | Register::PresentPosition => 2,
        }
    }

    /// 是否为位置类寄存器（需要经过标定换算为工程单位）
    pub const fn is_position(self) -> bool {
        matches!(self, Register::GoalPosition | Register::PresentPosition)
    }

    /// 是否可写
    pub const fn is_writable(self) -> bool {
        !matches!(self, Register::PresentPosition)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Register::TorqueEnable => "Torque_Enable",
            Register::Acceleration => "Acceleration",
            Register::GoalPosition => "Goal_Position",
            Register::GoalVelocity => "Goal_Velocity",
            Register::Lock => "Lock",
            Register::PresentPosition => "Present_Position",
        }
    }

    /// 将值编码为小端字节
    ///
    /// 单字节寄存器取低 8 位；双字节寄存器为无符号 16 位。
    pub fn encode(self, value: u16) -> Vec<u8> {
        match self.size() {
            1 => vec![value.min(u8::MAX as u16) as u8],
            _ => value.to_le_bytes().to_vec(),
        }
    }

    /// 从小端字节解码
    pub fn decode(self, bytes: &[u8]) -> Result<u16, ProtocolError> {
        let expected = self.size() as usize;
        if bytes.len() != expected {
            return Err(ProtocolError::InvalidLength {
                expected,
                actual: bytes.len(),
            });
        }
        Ok(match expected {
            1 => bytes[0] as u16,
            _ => u16::from_le_bytes([bytes[0], bytes[1]]),
        })
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Register {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Register::TorqueEnable,
            Register::Acceleration,
            Register::GoalPosition,
            Register::GoalVelocity,
            Register::Lock,
            Register::PresentPosition,
        ]
        .into_iter()
        .find(|reg| reg.name() == s)
        .ok_or_else(|| ProtocolError::UnknownRegister(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_table() {
        assert_eq!(Register::PresentPosition.address(), 56);
        assert_eq!(Register::GoalPosition.address(), 42);
        assert_eq!(Register::GoalVelocity.size(), 2);
        assert_eq!(Register::Acceleration.size(), 1);
        assert!(!Register::PresentPosition.is_writable());
        assert!(Register::GoalPosition.is_position());
    }

    #[test]
    fn test_encode_decode_little_endian() {
        assert_eq!(Register::GoalPosition.encode(0x0801), vec![0x01, 0x08]);
        assert_eq!(Register::Acceleration.encode(300), vec![0xFF]);
        assert_eq!(Register::PresentPosition.decode(&[0xFF, 0x0F]).unwrap(), 4095);
        assert!(Register::PresentPosition.decode(&[0x01]).is_err());
    }

    #[test]
    fn test_parse_lerobot_names() {
        assert_eq!("Goal_Velocity".parse::<Register>().unwrap(), Register::GoalVelocity);
        assert!("Goal_Speed".parse::<Register>().is_err());
    }
}
