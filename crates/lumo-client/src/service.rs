//! 手臂服务门面
//!
//! 显式构造后注入 API 层，持有双臂协调器、标定存储与运行时端口配置。

use crate::error::ArmError;
use crate::motion::{self, JointMoveReport, JointMoveRequest};
use lumo_bus::BusFactory;
use lumo_driver::{DualArm, DualArmStatus, LegacyArmStatus, MonitorConfig};
use lumo_protocol::{ArmRole, JointName};
use lumo_tools::config::validate_ports;
use lumo_tools::{CalibrationStore, LumoSettings, RoleLimits, RuntimeConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// 手臂服务
pub struct ArmService {
    arms: DualArm,
    calibration: CalibrationStore,
    config: Mutex<RuntimeConfig>,
}

impl ArmService {
    /// 构造服务并启动两个监视器
    pub fn new(
        config: RuntimeConfig,
        factory: Arc<dyn BusFactory>,
        monitor: MonitorConfig,
        calibration: CalibrationStore,
    ) -> Result<Self, ArmError> {
        let arms = DualArm::new(&config, factory, monitor)?;
        Ok(Self {
            arms,
            calibration,
            config: Mutex::new(config),
        })
    }

    /// 按配置文件构造（真实 Feetech 总线）
    pub fn from_settings(settings: &LumoSettings) -> Result<Self, ArmError> {
        settings.validate()?;
        let calibration = settings.calibration_store();
        let factory = Arc::new(lumo_bus::FeetechBusFactory::new(calibration.clone()));
        Self::new(
            settings.runtime_config(),
            factory,
            MonitorConfig::from(&settings.monitor),
            calibration,
        )
    }

    pub fn arms(&self) -> &DualArm {
        &self.arms
    }

    pub fn dual_status(&self) -> DualArmStatus {
        self.arms.dual_status()
    }

    pub fn legacy_status(&self) -> LegacyArmStatus {
        self.arms.legacy_status()
    }

    /// 两只手臂的标定限位（无标定文件时为空表）
    pub fn calibration_limits(&self) -> RoleLimits {
        self.calibration.role_limits()
    }

    /// 从臂单关节运动
    pub fn move_joint(&self, request: &JointMoveRequest) -> Result<JointMoveReport, ArmError> {
        motion::move_joint(&self.arms.follower(), &self.calibration, request)
    }

    pub fn pause_all(&self) {
        self.arms.pause_all();
    }

    pub fn resume_all(&self) {
        self.arms.resume_all();
    }

    /// 当前端口配置
    pub fn config(&self) -> RuntimeConfig {
        self.config.lock().clone()
    }

    /// 运行时更换端口
    ///
    /// 两个端口相同时直接拒绝，不触碰任何监视器。
    pub fn update_ports(
        &self,
        leader_port: &str,
        follower_port: &str,
    ) -> Result<RuntimeConfig, ArmError> {
        validate_ports(leader_port, follower_port)?;
        // 换端口会 join 旧监视器线程，不能持有配置锁
        let result = self.arms.set_ports(leader_port, follower_port);
        // 以监视器实际使用的端口为准
        let ports = self.arms.ports();
        *self.config.lock() = ports.clone();
        result?;
        info!(
            "Ports updated (leader {}, follower {})",
            ports.leader_port, ports.follower_port
        );
        Ok(ports)
    }

    /// 急停
    pub fn stop(&self) -> Result<(), ArmError> {
        Err(ArmError::NotImplemented("stop"))
    }

    /// 回零位
    pub fn home(&self) -> Result<(), ArmError> {
        Err(ArmError::NotImplemented("home"))
    }

    /// 多关节同时运动
    pub fn bulk_move(&self, _targets: &[(JointName, f64)], _speed: i32) -> Result<(), ArmError> {
        Err(ArmError::NotImplemented("bulk move"))
    }

    /// 指定手臂当前是否在线
    pub fn is_connected(&self, role: ArmRole) -> bool {
        self.arms.monitor(role).is_connected()
    }

    /// 停止监视并释放串口
    pub fn shutdown(&self) {
        self.arms.shutdown();
    }
}
