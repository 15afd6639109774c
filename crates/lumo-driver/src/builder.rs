//! Builder 模式实现
//!
//! 提供链式构造 `ArmMonitor` 实例的便捷方式。

use crate::error::DriverError;
use crate::monitor::ArmMonitor;
use lumo_bus::BusFactory;
use lumo_protocol::ArmRole;
use lumo_tools::config::MonitorSettings;
use std::sync::Arc;
use std::time::Duration;

/// 监视器配置
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// 轮询间隔（默认 100ms，即 10Hz）
    pub poll_interval: Duration,
    /// 连接失败后的重试间隔（默认 2s）
    pub retry_delay: Duration,
    /// 停止时等待线程退出的最长时间
    pub join_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            retry_delay: Duration::from_secs(2),
            join_timeout: Duration::from_secs(2),
        }
    }
}

impl From<&MonitorSettings> for MonitorConfig {
    fn from(settings: &MonitorSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            retry_delay: settings.retry_delay(),
            ..Self::default()
        }
    }
}

/// ArmMonitor Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use lumo_driver::{MonitorBuilder, MonitorConfig};
/// use lumo_bus::FeetechBusFactory;
/// use lumo_protocol::ArmRole;
/// use lumo_tools::CalibrationStore;
/// use std::sync::Arc;
///
/// let monitor = MonitorBuilder::new(ArmRole::Follower)
///     .port("/dev/ttyACM1")
///     .factory(Arc::new(FeetechBusFactory::new(CalibrationStore::from_env())))
///     .build()
///     .unwrap();
/// monitor.start().unwrap();
/// ```
pub struct MonitorBuilder {
    role: ArmRole,
    port: Option<String>,
    factory: Option<Arc<dyn BusFactory>>,
    config: MonitorConfig,
}

impl MonitorBuilder {
    pub fn new(role: ArmRole) -> Self {
        Self {
            role,
            port: None,
            factory: None,
            config: MonitorConfig::default(),
        }
    }

    /// 串口路径（必填）
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// 总线工厂（必填）
    pub fn factory(mut self, factory: Arc<dyn BusFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    /// 构造监视器（不启动线程）
    pub fn build(self) -> Result<ArmMonitor, DriverError> {
        let port = self
            .port
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| DriverError::Config(format!("{} port is required", self.role)))?;
        let factory = self
            .factory
            .ok_or_else(|| DriverError::Config("bus factory is required".into()))?;
        if self.config.poll_interval.is_zero() {
            return Err(DriverError::Config("poll interval must be positive".into()));
        }
        Ok(ArmMonitor::new(self.role, port, factory, self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::MonitorLifecycle;
    use lumo_bus::mock::MockBusFactory;

    #[test]
    fn test_build_requires_port_and_factory() {
        assert!(matches!(
            MonitorBuilder::new(ArmRole::Leader).build(),
            Err(DriverError::Config(_))
        ));
        assert!(matches!(
            MonitorBuilder::new(ArmRole::Leader).port("/dev/ttyACM0").build(),
            Err(DriverError::Config(_))
        ));
    }

    #[test]
    fn test_build_does_not_start() {
        let factory = MockBusFactory::new();
        let monitor = MonitorBuilder::new(ArmRole::Leader)
            .port("/dev/ttyACM0")
            .factory(Arc::new(factory.clone()))
            .poll_interval(Duration::from_millis(5))
            .build()
            .unwrap();
        assert_eq!(monitor.lifecycle(), MonitorLifecycle::Idle);
        assert_eq!(monitor.port(), "/dev/ttyACM0");
        assert!(factory.log().calls().is_empty());
    }

    #[test]
    fn test_config_from_settings() {
        let settings = MonitorSettings {
            poll_hz: 20.0,
            retry_delay_ms: 500,
        };
        let config = MonitorConfig::from(&settings);
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.retry_delay, Duration::from_millis(500));
    }
}
