//! Lumo SDK - SO-101 双臂监视与安全运动
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): Feetech STS 报文、寄存器表、单位换算
//! - **总线层** (`bus`): `ServoBus` 抽象、Feetech 串口实现、Mock 总线
//! - **工具层** (`tools`): 标定文件与配置
//! - **驱动层** (`driver`): 每臂一个轮询线程、暂停 / 恢复、双臂协调
//! - **客户端层** (`client`): 安全单关节运动、`ArmService` 门面
//! - **控制层** (`control`): LeRobot 外部进程与串口让渡
//!
//! # 快速开始
//!
//! ```no_run
//! use lumo_sdk::prelude::*;
//!
//! let settings = LumoSettings::load_default().unwrap();
//! let service = ArmService::from_settings(&settings).unwrap();
//! let status = service.dual_status();
//! println!("follower connected: {}", status.follower.connected());
//! ```

pub use lumo_bus as bus;
pub use lumo_client as client;
pub use lumo_control as control;
pub use lumo_driver as driver;
pub use lumo_protocol as protocol;
pub use lumo_tools as tools;

pub mod prelude;

pub use lumo_bus::{BusError, BusFactory, ServoBus};
pub use lumo_client::{ArmError, ArmService, JointMoveReport, JointMoveRequest};
pub use lumo_control::{ArmHandoff, ControlError, LerobotCommand, ManagedProcess};
pub use lumo_driver::{DriverError, DualArm, DualArmStatus, MonitorConfig, SingleArmStatus};
pub use lumo_protocol::{ArmRole, JointArray, JointName, ProtocolError};
pub use lumo_tools::{CalibrationStore, LumoSettings, RuntimeConfig};

use tracing_subscriber::EnvFilter;

/// 默认日志过滤
pub const DEFAULT_LOG_FILTER: &str = "lumo_driver=info,lumo_client=info,lumo_control=info";

/// 初始化日志
///
/// 同时把 `log` crate 的记录桥接到 `tracing`。`RUST_LOG` 优先于默认过滤。
/// 重复调用无副作用。
pub fn init_logger() {
    // 已安装过桥接或订阅者时忽略错误
    let _ = tracing_log::LogTracer::init();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
