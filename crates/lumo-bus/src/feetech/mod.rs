//! Feetech STS 串口总线驱动
//!
//! SO-101 的 6 个 STS3215 舵机挂在同一条半双工 TTL 总线上，
//! 通过 USB 串口适配器（1 Mbaud, 8N1）访问。
//!
//! ## 依赖
//!
//! - `serialport` crate
//! - 标定文件（位置寄存器需要以标定范围换算为度 / 百分比）
//!
//! ## 限制
//!
//! - **权限要求**：可能需要 `dialout` 组权限
//! - 同一端口同一时刻只能被一个进程打开

mod transport;

use crate::{BusDeviceError, BusDeviceErrorKind, BusError, BusFactory, ServoBus};
use lumo_protocol::{ArmRole, JointArray, NormMode, RawRange, Register};
use lumo_tools::{Calibration, CalibrationStore};
use std::io;
use std::time::Duration;
use tracing::{debug, info, warn};
use transport::Transport;

pub use transport::Link;

/// 默认波特率
pub const DEFAULT_BAUD_RATE: u32 = 1_000_000;

/// 默认读超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(50);

impl From<serialport::Error> for BusError {
    fn from(e: serialport::Error) -> Self {
        let kind = match e.kind() {
            serialport::ErrorKind::NoDevice => BusDeviceErrorKind::NotFound,
            serialport::ErrorKind::Io(io::ErrorKind::NotFound) => BusDeviceErrorKind::NotFound,
            serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
                BusDeviceErrorKind::AccessDenied
            },
            _ => return BusError::Serial(e),
        };
        BusError::Device(BusDeviceError::new(kind, e.to_string()))
    }
}

/// Feetech STS 总线
///
/// 构造时不做任何 IO；`connect` 打开串口，`disconnect` 关闭串口。
pub struct FeetechBus {
    port_name: String,
    baud_rate: u32,
    timeout: Duration,
    ids: JointArray<u8>,
    ranges: JointArray<Option<RawRange>>,
    modes: JointArray<NormMode>,
    transport: Option<Transport<Box<dyn serialport::SerialPort>>>,
}

impl FeetechBus {
    /// 创建总线（不打开串口）
    ///
    /// 无标定时仍可构造，但 `connect` 会返回 `MissingCalibration`。
    pub fn new(port_name: impl Into<String>, calibration: Option<&Calibration>) -> Self {
        let (ids, ranges) = match calibration {
            Some(c) => (c.ids(), c.raw_ranges()),
            None => (
                JointArray::from_fn(|joint| joint.default_id()),
                JointArray::default(),
            ),
        };
        Self {
            port_name: port_name.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
            ids,
            ranges,
            modes: Calibration::norm_modes(),
            transport: None,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn id_list(&self) -> Vec<u8> {
        self.ids.values().to_vec()
    }

    fn transport(&mut self) -> Result<&mut Transport<Box<dyn serialport::SerialPort>>, BusError> {
        self.transport.as_mut().ok_or(BusError::NotConnected)
    }

    fn write_raw(&mut self, register: Register, raw: &JointArray<u16>) -> Result<(), BusError> {
        let values: Vec<(u8, u16)> = self
            .ids
            .iter()
            .map(|(joint, id)| (*id, raw[joint]))
            .collect();
        self.transport()?.sync_write(register, &values)
    }

    /// 工程单位 -> 原始值
    fn to_raw(&self, register: Register, values: &JointArray<f64>) -> Result<JointArray<u16>, BusError> {
        if !register.is_position() {
            return Ok(values.map(|_, v| v.round().clamp(0.0, u16::MAX as f64) as u16));
        }
        let missing = self.ranges.missing();
        if !missing.is_empty() {
            return Err(BusError::MissingCalibration(missing));
        }
        Ok(values.map(|joint, v| {
            self.ranges[joint]
                .map(|range| range.to_raw(*v, self.modes[joint]))
                .unwrap_or_default()
        }))
    }
}

impl ServoBus for FeetechBus {
    fn connect(&mut self, handshake: bool) -> Result<(), BusError> {
        if self.transport.is_some() {
            return Ok(());
        }
        let missing = self.ranges.missing();
        if !missing.is_empty() {
            return Err(BusError::MissingCalibration(missing));
        }

        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(self.timeout)
            .open()?;
        let mut transport = Transport::new(port);

        if handshake {
            for (joint, id) in self.ids.iter() {
                if let Err(e) = transport.ping(*id) {
                    // 串口随 transport 一起关闭
                    return Err(BusDeviceError::new(
                        BusDeviceErrorKind::NoResponse,
                        format!("{} (id {}) on {}: {}", joint, id, self.port_name, e),
                    )
                    .into());
                }
            }
        }

        info!("Feetech bus opened on {} @ {} baud", self.port_name, self.baud_rate);
        self.transport = Some(transport);
        Ok(())
    }

    fn disconnect(&mut self, disable_torque: bool) -> Result<(), BusError> {
        if self.transport.is_none() {
            return Ok(());
        }
        let result = if disable_torque {
            self.write_raw(Register::TorqueEnable, &JointArray::splat(0))
        } else {
            Ok(())
        };
        self.transport = None;
        debug!("Feetech bus on {} closed", self.port_name);
        result
    }

    fn sync_read(&mut self, register: Register) -> Result<JointArray<Option<f64>>, BusError> {
        let ids = self.id_list();
        let raw = self.transport()?.sync_read(register, &ids)?;

        let values = self.ids.map(|joint, id| {
            let value = raw.iter().find(|(rid, _)| rid == id).map(|(_, v)| *v)?;
            if register.is_position() {
                self.ranges[joint].map(|range| range.to_units(value, self.modes[joint]))
            } else {
                Some(value as f64)
            }
        });
        let missing = values.missing();
        if !missing.is_empty() {
            warn!("No {} reply on {} from {:?}", register, self.port_name, missing);
        }
        Ok(values)
    }

    fn sync_write(&mut self, register: Register, values: &JointArray<f64>) -> Result<(), BusError> {
        if !register.is_writable() {
            return Err(BusError::ReadOnly(register));
        }
        let raw = self.to_raw(register, values)?;
        self.write_raw(register, &raw)
    }

    fn enable_torque(&mut self) -> Result<(), BusError> {
        self.write_raw(Register::TorqueEnable, &JointArray::splat(1))?;
        self.write_raw(Register::Lock, &JointArray::splat(1))
    }

    fn is_connected(&self) -> bool {
        self.transport.is_some()
    }
}

/// 按角色读取标定并构造 [`FeetechBus`]
///
/// 每次 `create` 都重新读取标定文件。
#[derive(Debug, Clone)]
pub struct FeetechBusFactory {
    store: CalibrationStore,
    baud_rate: u32,
    timeout: Duration,
}

impl FeetechBusFactory {
    pub fn new(store: CalibrationStore) -> Self {
        Self {
            store,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &CalibrationStore {
        &self.store
    }
}

impl BusFactory for FeetechBusFactory {
    fn create(&self, port: &str, role: ArmRole) -> Box<dyn ServoBus> {
        let calibration = self.store.load(role);
        Box::new(
            FeetechBus::new(port, calibration.as_ref())
                .with_baud_rate(self.baud_rate)
                .with_timeout(self.timeout),
        )
    }
}
