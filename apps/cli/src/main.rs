//! # Lumo CLI
//!
//! SO-101 双臂（主臂 + 从臂）命令行工具。
//!
//! ```bash
//! # 配置端口
//! lumo-cli config set ports.follower /dev/ttyACM1
//!
//! # 查看两只手臂的状态
//! lumo-cli status --json
//!
//! # 安全移动从臂单个关节
//! lumo-cli move --joint elbow_flex --angle 20 --speed 30
//!
//! # 运行 LeRobot 遥操作（期间监视器让出串口）
//! lumo-cli teleop
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod modes;
mod utils;

use commands::{CalibrationCommand, ConfigCommand, MoveCommand, RecordCommand, StatusCommand};
use modes::oneshot::{OneShotMode, PortOverrides};

/// Lumo CLI - SO-101 双臂命令行工具
#[derive(Parser, Debug)]
#[command(name = "lumo-cli")]
#[command(about = "Command-line interface for SO-101 leader/follower arm pairs", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 ~/.config/lumo/config.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 主臂串口（覆盖配置）
    #[arg(long, global = true)]
    leader_port: Option<String>,

    /// 从臂串口（覆盖配置）
    #[arg(long, global = true)]
    follower_port: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 查询两只手臂的连接状态与关节位置
    Status {
        #[command(flatten)]
        args: StatusCommand,
    },

    /// 持续监控两只手臂
    Monitor {
        /// 刷新频率（Hz）
        #[arg(short, long, default_value_t = 10)]
        frequency: u32,
    },

    /// 显示标定限位
    Calibration {
        #[command(flatten)]
        args: CalibrationCommand,
    },

    /// 移动从臂单个关节
    Move {
        #[command(flatten)]
        args: MoveCommand,
    },

    /// 运行 LeRobot 遥操作
    Teleop,

    /// 运行 LeRobot 数据录制
    Record {
        #[command(flatten)]
        args: RecordCommand,
    },

    /// 急停
    Stop,

    /// 回到零位
    Home,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lumo_cli=info".parse()?)
                .add_directive("lumo_driver=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let overrides = PortOverrides {
        leader: cli.leader_port,
        follower: cli.follower_port,
    };

    match cli.command {
        Commands::Config(cmd) => {
            // 配置命令不连接手臂
            cmd.execute(cli.config).await
        },

        Commands::Calibration { args } => {
            let mode = OneShotMode::new(cli.config, overrides)?;
            args.execute(mode.settings())
        },

        Commands::Status { args } => {
            let mode = OneShotMode::new(cli.config, overrides)?;
            mode.status(args).await
        },

        Commands::Monitor { frequency } => {
            let mode = OneShotMode::new(cli.config, overrides)?;
            mode.monitor(frequency).await
        },

        Commands::Move { args } => {
            let mode = OneShotMode::new(cli.config, overrides)?;
            mode.move_joint(args).await
        },

        Commands::Teleop => {
            let mode = OneShotMode::new(cli.config, overrides)?;
            mode.teleop().await
        },

        Commands::Record { args } => {
            let mode = OneShotMode::new(cli.config, overrides)?;
            mode.record(args).await
        },

        Commands::Stop => {
            let mode = OneShotMode::new(cli.config, overrides)?;
            mode.stop().await
        },

        Commands::Home => {
            let mode = OneShotMode::new(cli.config, overrides)?;
            mode.home().await
        },
    }
}
