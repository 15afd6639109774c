//! 录制命令
//!
//! 通过 LeRobot 录制遥操作数据集

use clap::Args;
use lumo_sdk::control::RecordOptions;

/// 录制命令参数
#[derive(Args, Debug)]
pub struct RecordCommand {
    /// 任务描述
    #[arg(long, default_value = "Pick and place")]
    pub task: String,

    /// 录制回合数
    #[arg(long, default_value_t = 10)]
    pub episodes: u32,

    /// 数据集 ID
    #[arg(long, default_value = "beluga-orin/demo")]
    pub repo_id: String,
}

impl RecordCommand {
    pub fn options(&self) -> RecordOptions {
        RecordOptions {
            task: self.task.clone(),
            num_episodes: self.episodes,
            repo_id: self.repo_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_record_options() {
        let cmd = RecordCommand {
            task: "Pick and place".into(),
            episodes: 10,
            repo_id: "beluga-orin/demo".into(),
        };
        assert_eq!(cmd.options(), RecordOptions::default());
    }
}
