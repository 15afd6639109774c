//! 串口让渡

use lumo_client::ArmService;
use lumo_driver::DualArm;
use std::sync::Arc;

/// 能够整体让出 / 收回两只手臂串口的对象
pub trait ArmHandoff: Send + Sync {
    /// 返回时两只手臂的串口都已关闭
    fn pause_all(&self);
    fn resume_all(&self);
}

impl ArmHandoff for DualArm {
    fn pause_all(&self) {
        DualArm::pause_all(self);
    }

    fn resume_all(&self) {
        DualArm::resume_all(self);
    }
}

impl ArmHandoff for ArmService {
    fn pause_all(&self) {
        ArmService::pause_all(self);
    }

    fn resume_all(&self) {
        ArmService::resume_all(self);
    }
}

impl<T: ArmHandoff + ?Sized> ArmHandoff for Arc<T> {
    fn pause_all(&self) {
        (**self).pause_all();
    }

    fn resume_all(&self) {
        (**self).resume_all();
    }
}
