//! LeRobot 命令行构造

use lumo_tools::{LumoSettings, RuntimeConfig};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const TELEOPERATE_BIN: &str = "lerobot-teleoperate";
pub const RECORD_BIN: &str = "lerobot-record";

const FOLLOWER_TYPE: &str = "so101_follower";
const LEADER_TYPE: &str = "so101_leader";

/// 构造命令所需的端口、标定 ID 与可执行文件目录
#[derive(Debug, Clone, PartialEq)]
pub struct LerobotContext {
    pub ports: RuntimeConfig,
    pub leader_id: String,
    pub follower_id: String,
    /// 为 `None` 时从 PATH 查找
    pub bin_dir: Option<PathBuf>,
}

impl LerobotContext {
    /// 使用当前端口（可能已在运行时修改）与配置文件中的 ID
    pub fn from_settings(settings: &LumoSettings, ports: RuntimeConfig) -> Self {
        Self {
            ports,
            leader_id: settings.calibration.leader_id.clone(),
            follower_id: settings.calibration.follower_id.clone(),
            bin_dir: settings.lerobot.bin_dir.clone(),
        }
    }

    fn program(&self, name: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}

/// 录制参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordOptions {
    pub task: String,
    pub num_episodes: u32,
    pub repo_id: String,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            task: "Pick and place".to_string(),
            num_episodes: 10,
            repo_id: "beluga-orin/demo".to_string(),
        }
    }
}

/// 一条 LeRobot 命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LerobotCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl LerobotCommand {
    fn arm_args(ctx: &LerobotContext) -> Vec<String> {
        vec![
            format!("--robot.type={FOLLOWER_TYPE}"),
            format!("--robot.port={}", ctx.ports.follower_port),
            format!("--robot.id={}", ctx.follower_id),
            format!("--teleop.type={LEADER_TYPE}"),
            format!("--teleop.port={}", ctx.ports.leader_port),
            format!("--teleop.id={}", ctx.leader_id),
        ]
    }

    /// 主臂遥操作从臂
    pub fn teleoperate(ctx: &LerobotContext) -> Self {
        let mut args = Self::arm_args(ctx);
        args.push("--display_data=false".to_string());
        Self {
            program: ctx.program(TELEOPERATE_BIN),
            args,
        }
    }

    /// 遥操作并录制数据集
    pub fn record(ctx: &LerobotContext, options: &RecordOptions) -> Self {
        let mut args = Self::arm_args(ctx);
        args.extend([
            format!("--dataset.repo_id={}", options.repo_id),
            format!("--dataset.num_episodes={}", options.num_episodes),
            format!("--dataset.single_task={}", options.task),
            "--display_data=false".to_string(),
        ]);
        Self {
            program: ctx.program(RECORD_BIN),
            args,
        }
    }

    /// 任意命令（测试与自定义工具）
    pub fn custom<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.args.iter().map(OsStr::new));
        command
    }
}

impl std::fmt::Display for LerobotCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
