//! 终端输出格式化

use lumo_sdk::driver::JointSample;
use lumo_sdk::{ArmRole, JointName, SingleArmStatus};

/// 单个关节值（未知时为 `--`）
pub fn format_sample(joint: JointName, sample: &JointSample) -> String {
    match sample.position {
        Some(value) if joint.is_gripper() => format!("{value:.1}%"),
        Some(value) => format!("{value:.1}°"),
        None => "--".to_string(),
    }
}

/// 多行状态（`status` 命令）
pub fn format_arm(role: ArmRole, status: &SingleArmStatus) -> String {
    let state = if status.connected() { "✅ 已连接" } else { "❌ 未连接" };
    let mut out = format!("{} ({}): {}\n", role.as_str(), status.port(), state);
    for (joint, sample) in status.joints().iter() {
        out.push_str(&format!("  {:<14} {:>8}\n", joint.as_str(), format_sample(joint, sample)));
    }
    out
}

/// 单行状态（`monitor` 命令）
pub fn format_compact(role: ArmRole, status: &SingleArmStatus) -> String {
    if !status.connected() {
        return format!("{:<8} 未连接 ({})", role.as_str(), status.port());
    }
    let joints: Vec<String> = status
        .joints()
        .iter()
        .map(|(joint, sample)| format_sample(joint, sample))
        .collect();
    format!("{:<8} {}", role.as_str(), joints.join(" "))
}
