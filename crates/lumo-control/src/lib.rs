//! # Lumo Control
//!
//! 外部 LeRobot 进程（遥操作 / 数据录制）的生命周期管理。
//!
//! 外部进程需要独占两只手臂的串口：启动前暂停所有监视器，
//! 进程以任何方式退出后再恢复监视。

mod error;
pub mod handoff;
pub mod lerobot;
pub mod process;

pub use error::ControlError;
pub use handoff::ArmHandoff;
pub use lerobot::{LerobotCommand, LerobotContext, RecordOptions};
pub use process::{ManagedProcess, ProcessStatus};
