//! 配置管理命令
//!
//! 读写 `~/.config/lumo/config.toml`（点分键，如 `ports.leader`）

use anyhow::{Context, Result};
use clap::Subcommand;
use lumo_sdk::tools::LumoSettings;
use lumo_sdk::{ArmRole, CalibrationStore};
use std::path::{Path, PathBuf};

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 配置键（如 ports.leader, monitor.poll_hz）
        key: String,

        /// 新值
        value: String,
    },

    /// 获取配置项
    Get {
        /// 配置键（省略时显示全部）
        key: Option<String>,
    },

    /// 检查配置与标定文件
    Check,
}

fn settings_path(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => LumoSettings::default_path().context("无法确定配置目录"),
    }
}

impl ConfigCommand {
    pub async fn execute(self, path: Option<PathBuf>) -> Result<()> {
        let path = settings_path(path)?;
        match self {
            ConfigCommand::Set { key, value } => Self::set_(&path, &key, &value),
            ConfigCommand::Get { key } => Self::get_(&path, key.as_deref()),
            ConfigCommand::Check => Self::check_(&path),
        }
    }

    fn set_(path: &Path, key: &str, value: &str) -> Result<()> {
        let mut settings = LumoSettings::load(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        settings
            .set(key, value)
            .with_context(|| format!("无法设置 {key}"))?;
        settings
            .save(path)
            .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
        println!("✅ {} = {}", key, value);
        Ok(())
    }

    fn get_(path: &Path, key: Option<&str>) -> Result<()> {
        let settings = LumoSettings::load(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;

        match key {
            Some(key) => {
                if !LumoSettings::KEYS.contains(&key) {
                    anyhow::bail!("未知配置键: {key}（可用: {}）", LumoSettings::KEYS.join(", "));
                }
                println!("{}", settings.get(key).unwrap_or_else(|| "(未设置)".to_string()));
            },
            None => {
                println!("Lumo 配置 ({}):", path.display());
                for key in LumoSettings::KEYS {
                    let value = settings.get(key).unwrap_or_else(|| "(未设置)".to_string());
                    println!("  {:<24} {}", key, value);
                }
            },
        }
        Ok(())
    }

    fn check_(path: &Path) -> Result<()> {
        println!("配置文件: {}", path.display());
        if !path.exists() {
            println!("  (不存在，使用默认值)");
        }
        let settings = LumoSettings::load(path).context("配置无效")?;
        println!("  主臂端口: {}", settings.ports.leader);
        println!("  从臂端口: {}", settings.ports.follower);
        println!("  轮询: {} Hz", settings.monitor.poll_hz);

        let store: CalibrationStore = settings.calibration_store();
        println!("标定目录: {}", store.root().display());
        for role in [ArmRole::Leader, ArmRole::Follower] {
            let file = store.path(role);
            let state = match store.load(role) {
                Some(_) => "✅",
                None if file.exists() => "⚠️  无法解析",
                None => "❌ 缺失（使用默认限位）",
            };
            println!("  {:<8} {} {}", role.as_str(), file.display(), state);
        }

        if let Some(dir) = &settings.lerobot.bin_dir {
            let present = dir.join(lumo_sdk::control::lerobot::TELEOPERATE_BIN).exists();
            println!(
                "LeRobot: {} {}",
                dir.display(),
                if present { "✅" } else { "❌ 未找到 lerobot-teleoperate" }
            );
        } else {
            println!("LeRobot: 从 PATH 查找");
        }

        println!("✅ 配置有效");
        Ok(())
    }
}
