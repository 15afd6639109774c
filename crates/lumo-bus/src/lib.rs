//! # Lumo Bus Layer
//!
//! 舵机串口总线抽象层，提供统一的总线接口。
//!
//! - [`ServoBus`]: 总线能力接口（连接 / 断开 / 同步读写 / 扭矩使能）
//! - [`BusFactory`]: 按端口和角色构造总线实例（纯构造，不做 IO）
//! - `feetech`: Feetech STS 真实串口驱动（feature `serial`）
//! - `mock`: 确定性的测试替身（feature `mock`）

use lumo_protocol::{ArmRole, JointArray, JointName, ProtocolError, Register};
use std::fmt;
use thiserror::Error;

#[cfg(feature = "serial")]
pub mod feetech;

#[cfg(feature = "serial")]
pub use feetech::{FeetechBus, FeetechBusFactory};

#[cfg(feature = "mock")]
pub mod mock;

/// 总线层统一错误类型
#[derive(Error, Debug)]
pub enum BusError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serial")]
    #[error("Serial Error: {0}")]
    Serial(serialport::Error),
    #[error("Device Error: {0}")]
    Device(#[from] BusDeviceError),
    #[error("Protocol Error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Read timeout")]
    Timeout,
    #[error("Bus not connected")]
    NotConnected,
    #[error("Register {0} is read-only")]
    ReadOnly(Register),
    #[error("Missing calibration for joints: {0:?}")]
    MissingCalibration(Vec<JointName>),
}

/// 设备错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusDeviceErrorKind {
    Unknown,
    NotFound,
    AccessDenied,
    Busy,
    NoResponse,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct BusDeviceError {
    pub kind: BusDeviceErrorKind,
    pub message: String,
}

impl BusDeviceError {
    pub fn new(kind: BusDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 设备不存在或无权限（串口被拔出 / 被其他进程占用）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            BusDeviceErrorKind::NotFound | BusDeviceErrorKind::AccessDenied
        )
    }
}

impl From<&str> for BusDeviceError {
    fn from(message: &str) -> Self {
        Self::new(BusDeviceErrorKind::Unknown, message)
    }
}

/// 舵机总线能力接口
///
/// 真实驱动和测试替身都实现此 trait。
///
/// # 约束
///
/// - `connect` 不得写任何寄存器、不得改变扭矩状态
/// - `disconnect(false)` 不得改变扭矩状态
/// - `sync_read` 只读
pub trait ServoBus: Send {
    /// 打开链路；`handshake` 为 true 时确认所有舵机在线
    fn connect(&mut self, handshake: bool) -> Result<(), BusError>;

    /// 释放链路
    fn disconnect(&mut self, disable_torque: bool) -> Result<(), BusError>;

    /// 同步读取所有关节的同一寄存器
    ///
    /// 某个舵机未应答时对应关节为 `None`。
    fn sync_read(&mut self, register: Register) -> Result<JointArray<Option<f64>>, BusError>;

    /// 同步写入所有关节的同一寄存器
    fn sync_write(&mut self, register: Register, values: &JointArray<f64>) -> Result<(), BusError>;

    /// 使能扭矩：舵机开始跟踪最后一次写入的 `Goal_Position`
    fn enable_torque(&mut self) -> Result<(), BusError>;

    fn is_connected(&self) -> bool;
}

impl fmt::Debug for dyn ServoBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServoBus")
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// 总线工厂
///
/// 只负责构造，不做任何 IO；连接由监视器线程调用 `connect` 完成。
pub trait BusFactory: Send + Sync {
    fn create(&self, port: &str, role: ArmRole) -> Box<dyn ServoBus>;
}

impl<F> BusFactory for F
where
    F: Fn(&str, ArmRole) -> Box<dyn ServoBus> + Send + Sync,
{
    fn create(&self, port: &str, role: ArmRole) -> Box<dyn ServoBus> {
        self(port, role)
    }
}
