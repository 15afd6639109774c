//! One-shot 模式
//!
//! 每个命令独立执行：
//! 1. 读取配置（命令行端口覆盖配置文件）
//! 2. 启动双臂监视
//! 3. 执行操作
//! 4. 停止监视并释放串口

use anyhow::{Context, Result};
use lumo_sdk::control::{LerobotContext, ManagedProcess};
use lumo_sdk::{ArmError, ArmRole, ArmService, LerobotCommand, LumoSettings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::commands::{MoveCommand, RecordCommand, StatusCommand};
use crate::utils;

/// 命令行端口覆盖
#[derive(Debug, Clone, Default)]
pub struct PortOverrides {
    pub leader: Option<String>,
    pub follower: Option<String>,
}

/// One-shot 模式
pub struct OneShotMode {
    settings: LumoSettings,
}

impl OneShotMode {
    pub fn new(path: Option<PathBuf>, overrides: PortOverrides) -> Result<Self> {
        let mut settings = match &path {
            Some(path) => LumoSettings::load(path)
                .with_context(|| format!("读取配置文件失败: {}", path.display()))?,
            None => LumoSettings::load_default().context("读取配置失败")?,
        };
        if let Some(port) = overrides.leader {
            settings.ports.leader = port;
        }
        if let Some(port) = overrides.follower {
            settings.ports.follower = port;
        }
        settings.validate().context("端口配置无效")?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &LumoSettings {
        &self.settings
    }

    fn start_service(&self) -> Result<Arc<ArmService>> {
        let service = ArmService::from_settings(&self.settings).context("启动手臂监视失败")?;
        Ok(Arc::new(service))
    }

    /// 等待每只手臂完成首次连接尝试（成功或失败）
    async fn wait_for_arms(service: &ArmService, roles: &[ArmRole], timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let settled = roles.iter().all(|&role| {
                let monitor = service.arms().monitor(role);
                monitor.is_connected() || monitor.metrics().connect_failures > 0
            });
            if settled {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        debug!("Timed out waiting for first connection attempt");
    }

    /// 状态查询
    pub async fn status(&self, args: StatusCommand) -> Result<()> {
        let service = self.start_service()?;
        Self::wait_for_arms(
            &service,
            &[ArmRole::Leader, ArmRole::Follower],
            Duration::from_millis(args.wait_ms),
        )
        .await;

        if args.legacy {
            let legacy = service.legacy_status();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&legacy)?);
            } else {
                println!("{}", legacy.message);
            }
            service.shutdown();
            return Ok(());
        }

        let status = service.dual_status();
        if args.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
        } else {
            print!("{}", utils::format_arm(ArmRole::Leader, &status.leader));
            print!("{}", utils::format_arm(ArmRole::Follower, &status.follower));
        }
        service.shutdown();
        Ok(())
    }

    /// 持续监控
    pub async fn monitor(&self, frequency: u32) -> Result<()> {
        let service = self.start_service()?;
        let period = Duration::from_secs_f64(1.0 / f64::from(frequency.max(1)));

        println!("📊 监控中 ({} Hz)...", frequency.max(1));
        println!("按 Ctrl+C 停止\n");

        let mut ticker = tokio::time::interval(period);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            tokio::select! {
                result = &mut ctrl_c => {
                    result.context("无法监听 Ctrl+C")?;
                    println!("\n收到退出信号，正在关闭...");
                    break;
                },
                _ = ticker.tick() => {
                    let status = service.dual_status();
                    println!(
                        "{} | {}",
                        utils::format_compact(ArmRole::Leader, &status.leader),
                        utils::format_compact(ArmRole::Follower, &status.follower),
                    );
                },
            }
        }
        service.shutdown();
        Ok(())
    }

    /// 单关节运动
    pub async fn move_joint(&self, args: MoveCommand) -> Result<()> {
        let service = self.start_service()?;
        Self::wait_for_arms(&service, &[ArmRole::Follower], Duration::from_millis(args.wait_ms)).await;

        let request = args.request();
        println!(
            "⏳ 移动 {} → {:.1} (速度 {}%)...",
            request.joint,
            request.angle,
            request.clamped_speed()
        );

        // 总线 IO 是阻塞的
        let worker = service.clone();
        let result = tokio::task::spawn_blocking(move || worker.move_joint(&request)).await?;
        service.shutdown();

        let report = match result {
            Ok(report) => report,
            Err(e @ ArmError::Offline { .. }) => {
                anyhow::bail!("{e}（检查从臂串口 {}）", self.settings.ports.follower)
            },
            Err(e) => return Err(e).context("移动失败"),
        };

        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            if report.clamped {
                println!("⚠️  目标 {:.1} 超出限位，已截断为 {:.1}", report.requested, report.angle_sent);
            }
            println!(
                "✅ {} 已发送 {:.1} (Goal_Velocity={}, Acceleration={})",
                report.joint, report.angle_sent, report.goal_velocity, report.acceleration
            );
        }
        Ok(())
    }

    /// LeRobot 遥操作
    pub async fn teleop(&self) -> Result<()> {
        let service = self.start_service()?;
        let ctx = LerobotContext::from_settings(&self.settings, service.config());
        self.run_session("teleop", LerobotCommand::teleoperate(&ctx), service).await
    }

    /// LeRobot 录制
    pub async fn record(&self, args: RecordCommand) -> Result<()> {
        let service = self.start_service()?;
        let ctx = LerobotContext::from_settings(&self.settings, service.config());
        let command = LerobotCommand::record(&ctx, &args.options());
        self.run_session("record", command, service).await
    }

    /// 运行外部进程直到其退出或 Ctrl+C
    async fn run_session(
        &self,
        name: &str,
        command: LerobotCommand,
        service: Arc<ArmService>,
    ) -> Result<()> {
        let process = Arc::new(ManagedProcess::new(name));
        let pid = {
            let process = process.clone();
            let handoff = service.clone();
            tokio::task::spawn_blocking(move || process.start(&command, handoff))
                .await?
                .with_context(|| format!("启动 {name} 失败"))?
        };
        println!("🚀 {} 已启动 (PID {})，手臂监视已暂停", name, pid);
        println!("按 Ctrl+C 停止\n");

        let mut ticker = tokio::time::interval(Duration::from_millis(200));
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut last_line = String::new();
        loop {
            tokio::select! {
                result = &mut ctrl_c => {
                    result.context("无法监听 Ctrl+C")?;
                    println!("\n收到退出信号，正在停止 {}...", name);
                    let process = process.clone();
                    tokio::task::spawn_blocking(move || process.stop()).await??;
                    break;
                },
                _ = ticker.tick() => {
                    let status = process.status();
                    if !status.last_line.is_empty() && status.last_line != last_line {
                        println!("  {}", status.last_line);
                        last_line = status.last_line;
                    }
                    if !status.running {
                        break;
                    }
                },
            }
        }

        {
            let process = process.clone();
            tokio::task::spawn_blocking(move || process.wait()).await?;
        }
        let status = process.status();
        match status.return_code {
            Some(0) => println!("✅ {} 已结束", name),
            Some(code) => println!("⚠️  {} 退出码 {}", name, code),
            None => println!("⚠️  {} 已结束（无退出码）", name),
        }
        println!("🔌 手臂监视已恢复");
        service.shutdown();
        Ok(())
    }

    /// 急停
    pub async fn stop(&self) -> Result<()> {
        let service = self.start_service()?;
        let result = service.stop();
        service.shutdown();
        result.context("急停不可用")
    }

    /// 回到零位
    pub async fn home(&self) -> Result<()> {
        let service = self.start_service()?;
        let result = service.home();
        service.shutdown();
        result.context("回零不可用")
    }
}
