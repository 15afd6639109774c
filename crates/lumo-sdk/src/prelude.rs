//! 常用类型一次导入
//!
//! ```
//! use lumo_sdk::prelude::*;
//! ```

pub use lumo_client::{ArmError, ArmService, JointMoveReport, JointMoveRequest};
pub use lumo_control::{ArmHandoff, LerobotCommand, LerobotContext, ManagedProcess, RecordOptions};
pub use lumo_driver::{DualArm, DualArmStatus, LegacyArmStatus, MonitorConfig, SingleArmStatus};
pub use lumo_protocol::{ArmRole, JointArray, JointName};
pub use lumo_tools::{CalibrationStore, JointLimit, LumoSettings, RoleLimits, RuntimeConfig};
