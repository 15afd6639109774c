//! # Lumo Driver
//!
//! 双臂监视层：
//! - 每只手臂一个后台轮询线程（连接生命周期、位置快照）
//! - 暂停 / 恢复协议（把串口让给外部进程）
//! - 双臂协调与运行时换端口
//!
//! 大多数用户应该使用 `lumo-client` 提供的 `ArmService`。

mod builder;
pub mod dual;
mod error;
pub mod metrics;
pub mod mode;
pub mod monitor;
pub mod state;

pub use builder::{MonitorBuilder, MonitorConfig};
pub use dual::DualArm;
pub use error::DriverError;
pub use metrics::{MetricsSnapshot, MonitorMetrics};
pub use mode::{AtomicMonitorMode, MonitorMode};
pub use monitor::{ArmMonitor, MonitorLifecycle};
pub use state::{DualArmStatus, JointSample, JointsMap, LegacyArmStatus, SingleArmStatus};
