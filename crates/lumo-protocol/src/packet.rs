//! 指令包构建与状态包解析
//!
//! 包格式：
//!
//! ```text
//! 指令包: FF FF | ID | LEN | INSTR | P1..Pn | CHK
//! 状态包: FF FF | ID | LEN | ERR   | P1..Pn | CHK
//! LEN = n + 2, CHK = !(ID + LEN + INSTR/ERR + ΣP)
//! ```

use crate::ProtocolError;
use crate::register::Register;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 包头
pub const HEADER: [u8; 2] = [0xFF, 0xFF];

/// 广播地址（SYNC_READ / SYNC_WRITE 使用）
pub const BROADCAST_ID: u8 = 0xFE;

/// 固件允许的最大包长
pub const MAX_PACKET_LEN: usize = 250;

/// 状态包中被视为故障的错误位（电压 / 角度 / 过热 / 过流 / 过载）
pub const ERROR_MASK: u8 = 0b0010_1111;

/// 指令码
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
    SyncRead = 0x82,
    SyncWrite = 0x83,
}

/// 计算校验和（不含包头）
pub fn checksum(body: &[u8]) -> u8 {
    !body.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// 构建指令包
pub fn encode_instruction(
    id: u8,
    instruction: Instruction,
    params: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    let total = params.len() + 6;
    if total > MAX_PACKET_LEN {
        return Err(ProtocolError::PacketTooLong(total));
    }

    let mut packet = Vec::with_capacity(total);
    packet.extend_from_slice(&HEADER);
    packet.push(id);
    packet.push((params.len() + 2) as u8);
    packet.push(instruction.into());
    packet.extend_from_slice(params);
    packet.push(checksum(&packet[2..]));
    Ok(packet)
}

/// PING 单个舵机（握手用）
pub fn ping(id: u8) -> Vec<u8> {
    // 无参数，长度固定 6 字节，不会超长
    let mut packet = vec![HEADER[0], HEADER[1], id, 2, Instruction::Ping.into()];
    packet.push(checksum(&packet[2..]));
    packet
}

/// SYNC_READ：一次请求读取多个舵机的同一寄存器
///
/// 每个舵机按 `ids` 顺序各回一个状态包。
pub fn sync_read(register: Register, ids: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut params = Vec::with_capacity(ids.len() + 2);
    params.push(register.address());
    params.push(register.size());
    params.extend_from_slice(ids);
    encode_instruction(BROADCAST_ID, Instruction::SyncRead, &params)
}

/// SYNC_WRITE：一次写入多个舵机的同一寄存器（无应答）
pub fn sync_write(register: Register, values: &[(u8, u16)]) -> Result<Vec<u8>, ProtocolError> {
    let mut params = Vec::with_capacity(values.len() * (register.size() as usize + 1) + 2);
    params.push(register.address());
    params.push(register.size());
    for (id, value) in values {
        params.push(*id);
        params.extend_from_slice(&register.encode(*value));
    }
    encode_instruction(BROADCAST_ID, Instruction::SyncWrite, &params)
}

/// 舵机状态包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPacket {
    pub id: u8,
    pub error: u8,
    pub params: Vec<u8>,
}

impl StatusPacket {
    /// 状态包头长度（FF FF ID LEN）
    pub const HEADER_LEN: usize = 4;

    /// 根据 4 字节包头计算剩余需要读取的字节数
    pub fn remaining_len(header: &[u8; 4]) -> Result<usize, ProtocolError> {
        if header[..2] != HEADER {
            return Err(ProtocolError::InvalidHeader([header[0], header[1]]));
        }
        let len = header[3] as usize;
        if len < 2 {
            return Err(ProtocolError::InvalidLength {
                expected: 2,
                actual: len,
            });
        }
        Ok(len)
    }

    /// 解析完整状态包（含包头）
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.len() < 6 {
            return Err(ProtocolError::InvalidLength {
                expected: 6,
                actual: frame.len(),
            });
        }
        let header = [frame[0], frame[1], frame[2], frame[3]];
        let len = Self::remaining_len(&header)?;
        if frame.len() != Self::HEADER_LEN + len {
            return Err(ProtocolError::InvalidLength {
                expected: Self::HEADER_LEN + len,
                actual: frame.len(),
            });
        }

        let (body, chk) = frame[2..].split_at(frame.len() - 3);
        let expected = checksum(body);
        if expected != chk[0] {
            return Err(ProtocolError::ChecksumMismatch {
                expected,
                actual: chk[0],
            });
        }

        Ok(Self {
            id: frame[2],
            error: frame[4],
            params: frame[5..frame.len() - 1].to_vec(),
        })
    }

    /// 错误位检查
    pub fn check(&self) -> Result<(), ProtocolError> {
        if self.error & ERROR_MASK != 0 {
            return Err(ProtocolError::ServoStatus {
                id: self.id,
                status: self.error,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_frame(id: u8, error: u8, params: &[u8]) -> Vec<u8> {
        let mut frame = vec![0xFF, 0xFF, id, (params.len() + 2) as u8, error];
        frame.extend_from_slice(params);
        frame.push(checksum(&frame[2..]));
        frame
    }

    #[test]
    fn test_ping_packet() {
        // 参考 Feetech 文档示例：PING ID 1 -> FF FF 01 02 01 FB
        assert_eq!(ping(1), vec![0xFF, 0xFF, 0x01, 0x02, 0x01, 0xFB]);
    }

    #[test]
    fn test_sync_read_packet_layout() {
        let packet = sync_read(Register::PresentPosition, &[1, 2, 3]).unwrap();
        assert_eq!(&packet[..5], &[0xFF, 0xFF, BROADCAST_ID, 7, 0x82]);
        assert_eq!(&packet[5..10], &[56, 2, 1, 2, 3]);
        assert_eq!(*packet.last().unwrap(), checksum(&packet[2..packet.len() - 1]));
    }

    #[test]
    fn test_sync_write_packet_layout() {
        let packet = sync_write(Register::GoalPosition, &[(1, 2048), (2, 1000)]).unwrap();
        // addr, size, id1, lo, hi, id2, lo, hi
        assert_eq!(&packet[5..13], &[42, 2, 1, 0x00, 0x08, 2, 0xE8, 0x03]);
        assert_eq!(packet[3] as usize, 8 + 2);
    }

    #[test]
    fn test_packet_too_long_rejected() {
        let params = vec![0u8; MAX_PACKET_LEN];
        assert!(matches!(
            encode_instruction(1, Instruction::Write, &params),
            Err(ProtocolError::PacketTooLong(_))
        ));
    }

    #[test]
    fn test_status_decode() {
        let frame = status_frame(3, 0, &[0x00, 0x08]);
        let status = StatusPacket::decode(&frame).unwrap();
        assert_eq!(status.id, 3);
        assert_eq!(status.params, vec![0x00, 0x08]);
        assert!(status.check().is_ok());
    }

    #[test]
    fn test_status_decode_checksum_mismatch() {
        let mut frame = status_frame(3, 0, &[0x00, 0x08]);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(matches!(
            StatusPacket::decode(&frame),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_status_error_bits() {
        let frame = status_frame(5, 0b0000_0100, &[]);
        let status = StatusPacket::decode(&frame).unwrap();
        assert!(matches!(
            status.check(),
            Err(ProtocolError::ServoStatus { id: 5, .. })
        ));
    }

    #[test]
    fn test_instruction_conversion() {
        assert_eq!(Instruction::try_from(0x83).unwrap(), Instruction::SyncWrite);
        assert!(Instruction::try_from(0x42).is_err());
    }
}
