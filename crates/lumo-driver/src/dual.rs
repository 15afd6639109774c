//! 双臂协调
//!
//! 持有主臂 / 从臂两个监视器，提供整体暂停 / 恢复与运行时换端口。
//! 监视器放在 `ArcSwap` 槽中：读者无锁获取当前实例，换端口时整体替换。

use crate::builder::MonitorConfig;
use crate::error::DriverError;
use crate::monitor::ArmMonitor;
use crate::state::{DualArmStatus, LegacyArmStatus};
use arc_swap::ArcSwap;
use lumo_bus::BusFactory;
use lumo_protocol::ArmRole;
use lumo_tools::RuntimeConfig;
use lumo_tools::config::validate_ports;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// 双臂监视协调器
pub struct DualArm {
    factory: Arc<dyn BusFactory>,
    config: MonitorConfig,
    leader: ArcSwap<ArmMonitor>,
    follower: ArcSwap<ArmMonitor>,
    // 串行化换端口与整体暂停 / 恢复
    swap_lock: Mutex<()>,
}

impl DualArm {
    /// 构造并启动两个监视器
    pub fn new(
        ports: &RuntimeConfig,
        factory: Arc<dyn BusFactory>,
        config: MonitorConfig,
    ) -> Result<Self, DriverError> {
        ports.validate()?;

        let leader = Arc::new(ArmMonitor::new(
            ArmRole::Leader,
            &ports.leader_port,
            factory.clone(),
            config.clone(),
        ));
        let follower = Arc::new(ArmMonitor::new(
            ArmRole::Follower,
            &ports.follower_port,
            factory.clone(),
            config.clone(),
        ));
        leader.start()?;
        follower.start()?;
        info!(
            "Dual arm monitoring started (leader {}, follower {})",
            ports.leader_port, ports.follower_port
        );

        Ok(Self {
            factory,
            config,
            leader: ArcSwap::new(leader),
            follower: ArcSwap::new(follower),
            swap_lock: Mutex::new(()),
        })
    }

    fn slot(&self, role: ArmRole) -> &ArcSwap<ArmMonitor> {
        match role {
            ArmRole::Leader => &self.leader,
            ArmRole::Follower => &self.follower,
        }
    }

    /// 当前监视器实例
    pub fn monitor(&self, role: ArmRole) -> Arc<ArmMonitor> {
        self.slot(role).load_full()
    }

    pub fn leader(&self) -> Arc<ArmMonitor> {
        self.monitor(ArmRole::Leader)
    }

    pub fn follower(&self) -> Arc<ArmMonitor> {
        self.monitor(ArmRole::Follower)
    }

    /// 两臂都让出串口（返回时串口均已关闭）
    ///
    /// 与换端口互斥：不会暂停一个即将被替换掉的旧监视器。
    pub fn pause_all(&self) {
        let _guard = self.swap_lock.lock();
        self.leader().pause();
        self.follower().pause();
    }

    pub fn resume_all(&self) {
        let _guard = self.swap_lock.lock();
        self.leader().resume();
        self.follower().resume();
    }

    /// 运行时换端口
    ///
    /// 端口未变化的手臂不受影响；变化的手臂先完全停止旧监视器，
    /// 再用新端口构造并启动新监视器。两个端口相同时直接拒绝，不触碰任何监视器。
    pub fn set_ports(&self, leader_port: &str, follower_port: &str) -> Result<(), DriverError> {
        validate_ports(leader_port, follower_port)?;
        let _guard = self.swap_lock.lock();

        for (role, port) in [(ArmRole::Leader, leader_port), (ArmRole::Follower, follower_port)] {
            let slot = self.slot(role);
            let current = slot.load_full();
            if current.port() == port {
                continue;
            }

            info!("Switching {} arm port {} -> {}", role, current.port(), port);
            current.stop();

            let next = Arc::new(ArmMonitor::new(
                role,
                port,
                self.factory.clone(),
                self.config.clone(),
            ));
            // 外部进程持有串口期间换端口：新监视器保持暂停
            if current.is_paused() {
                next.pause();
            }
            next.start()?;
            slot.store(next);
        }
        Ok(())
    }

    pub fn dual_status(&self) -> DualArmStatus {
        DualArmStatus {
            leader: self.leader().status(),
            follower: self.follower().status(),
        }
    }

    /// 旧版单臂状态（从臂）
    pub fn legacy_status(&self) -> LegacyArmStatus {
        LegacyArmStatus::from(&self.follower().status())
    }

    /// 当前端口
    pub fn ports(&self) -> RuntimeConfig {
        RuntimeConfig::new(self.leader().port(), self.follower().port())
    }

    /// 停止两个监视器并释放串口
    pub fn shutdown(&self) {
        self.leader().stop();
        self.follower().stop();
    }
}

impl Drop for DualArm {
    fn drop(&mut self) {
        self.shutdown();
    }
}
