//! # 配置
//!
//! - [`RuntimeConfig`]: 进程内端口配置（可在运行时修改）
//! - [`LumoSettings`]: 持久化 TOML 设置文件
//!
//! 配置文件路径：
//! - Linux: `~/.config/lumo/config.toml`
//! - macOS: `~/Library/Application Support/lumo/config.toml`

use crate::calibration::{CalibrationStore, DEFAULT_FOLLOWER_ID, DEFAULT_LEADER_ID, default_root};
use lumo_protocol::ArmRole;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LEADER_PORT: &str = "/dev/ttyACM0";
pub const DEFAULT_FOLLOWER_PORT: &str = "/dev/ttyACM1";

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Leader and follower ports must differ")]
    SamePorts,
    #[error("Empty {0} port")]
    EmptyPort(ArmRole),
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("Cannot determine config directory")]
    NoConfigDir,
}

/// 运行时端口配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub leader_port: String,
    pub follower_port: String,
}

impl RuntimeConfig {
    pub fn new(leader_port: impl Into<String>, follower_port: impl Into<String>) -> Self {
        Self {
            leader_port: leader_port.into(),
            follower_port: follower_port.into(),
        }
    }

    pub fn port(&self, role: ArmRole) -> &str {
        match role {
            ArmRole::Leader => &self.leader_port,
            ArmRole::Follower => &self.follower_port,
        }
    }

    /// 校验：端口非空且两臂端口不同
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ports(&self.leader_port, &self.follower_port)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LEADER_PORT, DEFAULT_FOLLOWER_PORT)
    }
}

/// 端口校验
pub fn validate_ports(leader: &str, follower: &str) -> Result<(), ConfigError> {
    if leader.trim().is_empty() {
        return Err(ConfigError::EmptyPort(ArmRole::Leader));
    }
    if follower.trim().is_empty() {
        return Err(ConfigError::EmptyPort(ArmRole::Follower));
    }
    if leader == follower {
        return Err(ConfigError::SamePorts);
    }
    Ok(())
}

/// 持久化设置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LumoSettings {
    pub ports: PortSettings,
    pub calibration: CalibrationSettings,
    pub monitor: MonitorSettings,
    pub lerobot: LerobotSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSettings {
    pub leader: String,
    pub follower: String,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            leader: DEFAULT_LEADER_PORT.to_string(),
            follower: DEFAULT_FOLLOWER_PORT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// 标定根目录（未设置时使用环境变量或 HuggingFace 缓存目录）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub leader_id: String,
    pub follower_id: String,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            dir: None,
            leader_id: DEFAULT_LEADER_ID.to_string(),
            follower_id: DEFAULT_FOLLOWER_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// 轮询频率（Hz）
    pub poll_hz: f64,
    /// 连接失败后的重试间隔（ms）
    pub retry_delay_ms: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_hz: 10.0,
            retry_delay_ms: 2000,
        }
    }
}

impl MonitorSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros((1_000_000.0 / self.poll_hz).round() as u64)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LerobotSettings {
    /// `lerobot-*` 可执行文件所在目录（未设置时从 PATH 查找）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_dir: Option<PathBuf>,
}

impl LumoSettings {
    /// 默认配置文件路径
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push("lumo");
        path.push("config.toml");
        Ok(path)
    }

    /// 从文件加载；文件不存在时返回默认配置
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// 从默认路径加载
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(Self::default_path()?)
    }

    /// 保存为 TOML（自动创建父目录）
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ports(&self.ports.leader, &self.ports.follower)?;
        if !(self.monitor.poll_hz.is_finite() && self.monitor.poll_hz > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "monitor.poll_hz".into(),
                reason: "must be a positive number".into(),
            });
        }
        Ok(())
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig::new(&self.ports.leader, &self.ports.follower)
    }

    pub fn calibration_store(&self) -> CalibrationStore {
        let root = self.calibration.dir.clone().unwrap_or_else(default_root);
        CalibrationStore::new(root)
            .with_ids(&self.calibration.leader_id, &self.calibration.follower_id)
    }

    /// 按点分键读取（`ports.leader` 等）
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "ports.leader" => self.ports.leader.clone(),
            "ports.follower" => self.ports.follower.clone(),
            "calibration.dir" => self.calibration.dir.as_ref()?.display().to_string(),
            "calibration.leader_id" => self.calibration.leader_id.clone(),
            "calibration.follower_id" => self.calibration.follower_id.clone(),
            "monitor.poll_hz" => self.monitor.poll_hz.to_string(),
            "monitor.retry_delay_ms" => self.monitor.retry_delay_ms.to_string(),
            "lerobot.bin_dir" => self.lerobot.bin_dir.as_ref()?.display().to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// 按点分键设置
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let previous = self.clone();
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        match key {
            "ports.leader" => self.ports.leader = value.to_string(),
            "ports.follower" => self.ports.follower = value.to_string(),
            "calibration.dir" => self.calibration.dir = Some(PathBuf::from(value)),
            "calibration.leader_id" => self.calibration.leader_id = value.to_string(),
            "calibration.follower_id" => self.calibration.follower_id = value.to_string(),
            "monitor.poll_hz" => {
                self.monitor.poll_hz = value.parse().map_err(|_| invalid("expected a number"))?
            },
            "monitor.retry_delay_ms" => {
                self.monitor.retry_delay_ms =
                    value.parse().map_err(|_| invalid("expected an integer"))?
            },
            "lerobot.bin_dir" => self.lerobot.bin_dir = Some(PathBuf::from(value)),
            _ => return Err(invalid("unknown key")),
        }
        if let Err(e) = self.validate() {
            *self = previous;
            return Err(e);
        }
        Ok(())
    }

    pub const KEYS: [&'static str; 8] = [
        "ports.leader",
        "ports.follower",
        "calibration.dir",
        "calibration.leader_id",
        "calibration.follower_id",
        "monitor.poll_hz",
        "monitor.retry_delay_ms",
        "lerobot.bin_dir",
    ];
}
