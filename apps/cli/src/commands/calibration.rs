//! 标定限位命令

use anyhow::Result;
use clap::Args;
use lumo_sdk::tools::{JointLimits, LumoSettings};

/// 标定命令参数
#[derive(Args, Debug)]
pub struct CalibrationCommand {
    /// 以 JSON 输出
    #[arg(long)]
    pub json: bool,
}

fn print_limits(role: &str, limits: &JointLimits) {
    if limits.is_empty() {
        println!("{role}: 无标定文件（运动时使用默认限位）");
        return;
    }
    println!("{role}:");
    for (joint, limit) in limits.iter() {
        println!("  {:<14} [{:>7.1}, {:>7.1}]", joint.as_str(), limit.min, limit.max);
    }
}

impl CalibrationCommand {
    pub fn execute(&self, settings: &LumoSettings) -> Result<()> {
        let store = settings.calibration_store();
        let limits = store.role_limits();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&limits)?);
            return Ok(());
        }

        println!("标定目录: {}", store.root().display());
        print_limits("leader", &limits.leader);
        print_limits("follower", &limits.follower);
        Ok(())
    }
}
