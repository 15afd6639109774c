//! 驱动层错误类型定义

use lumo_bus::BusError;
use lumo_protocol::ArmRole;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 总线错误
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// 手臂未连接（或已暂停）
    #[error("{role} arm is not connected")]
    Offline { role: ArmRole },

    /// 配置无效（如两臂端口相同）
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// 监视线程错误
    #[error("Monitor thread error: {0}")]
    MonitorThread(String),
}

impl From<lumo_tools::ConfigError> for DriverError {
    fn from(e: lumo_tools::ConfigError) -> Self {
        DriverError::Config(e.to_string())
    }
}
