//! 串口帧收发
//!
//! 与具体串口实现无关，只要求 `Read + Write`，便于用内存端口测试。

use crate::BusError;
use lumo_protocol::packet::{self, StatusPacket};
use lumo_protocol::{ProtocolError, Register};
use std::io::{self, Read, Write};
use tracing::{trace, warn};

/// 可丢弃接收缓冲的字节流
pub trait Link: Read + Write + Send {
    /// 发送新请求前丢弃残留的应答字节
    fn discard_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Link for Box<dyn serialport::SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}

fn map_io(e: io::Error) -> BusError {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => BusError::Timeout,
        _ => BusError::Io(e),
    }
}

/// Feetech 半双工链路
pub struct Transport<L> {
    link: L,
}

impl<L: Link> Transport<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    pub fn into_inner(self) -> L {
        self.link
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), BusError> {
        self.link.discard_input().map_err(map_io)?;
        trace!("tx {}", hex::encode(frame));
        self.link.write_all(frame).map_err(map_io)?;
        self.link.flush().map_err(map_io)
    }

    fn recv(&mut self) -> Result<StatusPacket, BusError> {
        let mut header = [0u8; StatusPacket::HEADER_LEN];
        self.link.read_exact(&mut header).map_err(map_io)?;
        let remaining = StatusPacket::remaining_len(&header)?;

        let mut frame = Vec::with_capacity(StatusPacket::HEADER_LEN + remaining);
        frame.extend_from_slice(&header);
        frame.resize(StatusPacket::HEADER_LEN + remaining, 0);
        self.link
            .read_exact(&mut frame[StatusPacket::HEADER_LEN..])
            .map_err(map_io)?;
        trace!("rx {}", hex::encode(&frame));

        Ok(StatusPacket::decode(&frame)?)
    }

    /// PING 单个舵机，确认其在线
    pub fn ping(&mut self, id: u8) -> Result<(), BusError> {
        self.send(&packet::ping(id))?;
        let status = self.recv()?;
        if status.id != id {
            return Err(ProtocolError::UnexpectedId {
                expected: id,
                actual: status.id,
            }
            .into());
        }
        status.check()?;
        Ok(())
    }

    /// SYNC_READ：返回 `(id, 原始值)`，未应答的舵机不出现在结果中
    ///
    /// 一个应答都没有时返回 `Timeout`。
    pub fn sync_read(&mut self, register: Register, ids: &[u8]) -> Result<Vec<(u8, u16)>, BusError> {
        self.send(&packet::sync_read(register, ids)?)?;

        let mut values = Vec::with_capacity(ids.len());
        for expected in ids {
            let status = match self.recv() {
                Ok(status) => status,
                // 后续舵机也不会再应答
                Err(BusError::Timeout) => break,
                Err(e) => return Err(e),
            };
            if !ids.contains(&status.id) {
                return Err(ProtocolError::UnexpectedId {
                    expected: *expected,
                    actual: status.id,
                }
                .into());
            }
            if let Err(e) = status.check() {
                warn!("Servo {} reported error while reading {}: {}", status.id, register, e);
                continue;
            }
            values.push((status.id, register.decode(&status.params)?));
        }

        if values.is_empty() && !ids.is_empty() {
            return Err(BusError::Timeout);
        }
        Ok(values)
    }

    /// SYNC_WRITE（广播，无应答）
    pub fn sync_write(&mut self, register: Register, values: &[(u8, u16)]) -> Result<(), BusError> {
        self.send(&packet::sync_write(register, values)?)
    }
}
