//! 移动命令
//!
//! 安全移动从臂单个关节：目标按标定限位截断，其余关节保持当前位置

use clap::Args;
use lumo_sdk::{JointMoveRequest, JointName};

/// 移动命令参数
#[derive(Args, Debug)]
pub struct MoveCommand {
    /// 关节名称（shoulder_pan, shoulder_lift, elbow_flex, wrist_flex, wrist_roll, gripper）
    #[arg(short, long)]
    pub joint: JointName,

    /// 目标角度（度；夹爪为 0-100%）
    #[arg(short, long, allow_hyphen_values = true)]
    pub angle: f64,

    /// 速度百分比（0-100）
    #[arg(short, long, default_value_t = 50)]
    pub speed: i32,

    /// 加速度（0-254）
    #[arg(long, default_value_t = 50)]
    pub acceleration: i32,

    /// 以 JSON 输出结果
    #[arg(long)]
    pub json: bool,

    /// 等待从臂连接的最长时间（毫秒）
    #[arg(long, default_value_t = 3000)]
    pub wait_ms: u64,
}

impl MoveCommand {
    pub fn request(&self) -> JointMoveRequest {
        JointMoveRequest::new(self.joint, self.angle)
            .speed(self.speed)
            .acceleration(self.acceleration)
    }
}
