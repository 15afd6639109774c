//! # Lumo Client
//!
//! 面向 API 层的接口：
//! - `motion`: 安全单关节运动流水线（先读当前位置，整表写入目标位置，最后使能扭矩）
//! - `service`: `ArmService` 门面（显式构造后注入 API 层，无全局单例）

mod error;
pub mod motion;
pub mod service;

pub use error::ArmError;
pub use motion::{JointMoveReport, JointMoveRequest, goal_velocity};
pub use service::ArmService;
