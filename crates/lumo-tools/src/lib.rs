//! # Lumo Tools - 标定与配置
//!
//! **依赖原则**: 只依赖 `lumo-protocol`，不做任何总线 IO
//!
//! ## 包含模块
//!
//! - `calibration` - LeRobot 标定文件加载与关节限位计算
//! - `config` - 运行时端口配置与 TOML 设置文件

pub mod calibration;
pub mod config;

pub use calibration::{
    Calibration, CalibrationEntry, CalibrationStore, JointLimit, JointLimits, RoleLimits,
};
pub use config::{ConfigError, LumoSettings, RuntimeConfig};
