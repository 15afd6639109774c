//! 手臂状态快照
//!
//! 轮询线程每次读取成功后整体替换快照；读者拿到的总是一份完整的副本。

use lumo_protocol::{ArmRole, JointArray};
use serde::Serialize;

/// 单关节采样（`None` 表示未知）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct JointSample {
    #[serde(rename = "pos")]
    pub position: Option<f64>,
    pub load: Option<f64>,
}

impl JointSample {
    pub const UNKNOWN: JointSample = JointSample {
        position: None,
        load: None,
    };

    pub fn at(position: Option<f64>) -> Self {
        Self {
            position,
            load: None,
        }
    }
}

/// 所有关节的采样
pub type JointsMap = JointArray<JointSample>;

/// 单臂状态
///
/// `connected == false` 时所有关节一定为未知（只能通过构造函数创建）。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleArmStatus {
    connected: bool,
    port: String,
    joints: JointsMap,
}

impl SingleArmStatus {
    pub fn offline(port: impl Into<String>) -> Self {
        Self {
            connected: false,
            port: port.into(),
            joints: JointArray::splat(JointSample::UNKNOWN),
        }
    }

    pub fn online(port: impl Into<String>, positions: &JointArray<Option<f64>>) -> Self {
        Self {
            connected: true,
            port: port.into(),
            joints: positions.map(|_, position| JointSample::at(*position)),
        }
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn joints(&self) -> &JointsMap {
        &self.joints
    }

    /// 所有关节位置（任一缺失时为 `None`）
    pub fn positions(&self) -> Option<JointArray<f64>> {
        self.joints.map(|_, sample| sample.position).transpose()
    }
}

/// 双臂状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DualArmStatus {
    pub leader: SingleArmStatus,
    pub follower: SingleArmStatus,
}

impl DualArmStatus {
    pub fn get(&self, role: ArmRole) -> &SingleArmStatus {
        match role {
            ArmRole::Leader => &self.leader,
            ArmRole::Follower => &self.follower,
        }
    }
}

/// 旧版单臂状态（由从臂投影）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacyArmStatus {
    pub connected: bool,
    pub message: String,
    pub joints: JointsMap,
}

impl From<&SingleArmStatus> for LegacyArmStatus {
    fn from(status: &SingleArmStatus) -> Self {
        let message = if status.connected {
            format!("Arm connected on {}", status.port)
        } else {
            format!("Arm not connected - port {} not available", status.port)
        };
        Self {
            connected: status.connected,
            message,
            joints: status.joints,
        }
    }
}
