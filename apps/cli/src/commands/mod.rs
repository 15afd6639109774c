//! 命令定义和实现

pub mod calibration;
pub mod config;
pub mod r#move;
pub mod record;
pub mod status;

pub use calibration::CalibrationCommand;
pub use config::ConfigCommand;
pub use r#move::MoveCommand;
pub use record::RecordCommand;
pub use status::StatusCommand;
