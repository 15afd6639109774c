//! 客户端错误类型

use lumo_bus::BusError;
use lumo_driver::DriverError;
use lumo_protocol::ArmRole;
use thiserror::Error;

/// 手臂操作错误
#[derive(Error, Debug)]
pub enum ArmError {
    /// 目标手臂未连接（零总线调用）
    #[error("{role} arm is not connected")]
    Offline { role: ArmRole },

    /// 运动前缺少某些关节的当前位置
    #[error("Failed to read present positions: {0}")]
    Read(String),

    /// 运动过程中的总线错误（读当前位置、写寄存器、使能扭矩）
    #[error("Actuation failed: {0}")]
    Actuation(#[source] BusError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// 监视线程异常
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ArmError {
    pub fn is_offline(&self) -> bool {
        matches!(self, ArmError::Offline { .. })
    }

    /// 对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            ArmError::Offline { .. } => 503,
            ArmError::Read(_) => 502,
            ArmError::Actuation(_) | ArmError::Internal(_) => 500,
            ArmError::Config(_) | ArmError::InvalidRequest(_) => 400,
            ArmError::NotImplemented(_) => 501,
        }
    }
}

impl From<DriverError> for ArmError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::Offline { role } => ArmError::Offline { role },
            DriverError::Bus(e) => ArmError::Actuation(e),
            DriverError::Config(msg) => ArmError::Config(msg),
            DriverError::MonitorThread(msg) => ArmError::Internal(msg),
        }
    }
}

impl From<lumo_tools::ConfigError> for ArmError {
    fn from(e: lumo_tools::ConfigError) -> Self {
        ArmError::Config(e.to_string())
    }
}
