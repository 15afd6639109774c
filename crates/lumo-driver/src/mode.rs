//! 监视器模式定义
//!
//! 暂停标志叠加在连接状态机之上：暂停期间轮询线程不触碰串口，
//! 外部进程（遥操作 / 录制）可以独占该端口。

use std::sync::atomic::{AtomicU8, Ordering};

/// 监视器模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MonitorMode {
    /// 正常轮询（默认）
    #[default]
    Active = 0,

    /// 已让出串口
    Paused = 1,
}

impl MonitorMode {
    /// 无效值视为 Active
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Paused,
            _ => Self::Active,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_paused(self) -> bool {
        self == Self::Paused
    }
}

/// 监视器模式（原子版本，用于线程间共享）
///
/// 暂停一侧必须先写标志、再获取总线锁；
/// 轮询线程在总线锁内重新检查标志。
#[derive(Debug)]
pub struct AtomicMonitorMode {
    inner: AtomicU8,
}

impl AtomicMonitorMode {
    pub fn new(mode: MonitorMode) -> Self {
        Self {
            inner: AtomicU8::new(mode.as_u8()),
        }
    }

    pub fn get(&self, ordering: Ordering) -> MonitorMode {
        MonitorMode::from_u8(self.inner.load(ordering))
    }

    pub fn set(&self, mode: MonitorMode, ordering: Ordering) {
        self.inner.store(mode.as_u8(), ordering);
    }

    /// 设置新模式并返回旧模式
    pub fn swap(&self, mode: MonitorMode, ordering: Ordering) -> MonitorMode {
        MonitorMode::from_u8(self.inner.swap(mode.as_u8(), ordering))
    }

    pub fn is_paused(&self) -> bool {
        self.get(Ordering::Acquire).is_paused()
    }
}

impl Default for AtomicMonitorMode {
    fn default() -> Self {
        Self::new(MonitorMode::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8() {
        assert_eq!(MonitorMode::from_u8(0), MonitorMode::Active);
        assert_eq!(MonitorMode::from_u8(1), MonitorMode::Paused);
        assert_eq!(MonitorMode::from_u8(255), MonitorMode::Active); // 无效值
    }

    #[test]
    fn test_atomic_mode() {
        let mode = AtomicMonitorMode::default();
        assert!(!mode.is_paused());

        assert_eq!(mode.swap(MonitorMode::Paused, Ordering::AcqRel), MonitorMode::Active);
        assert!(mode.is_paused());

        mode.set(MonitorMode::Active, Ordering::Release);
        assert_eq!(mode.get(Ordering::Acquire), MonitorMode::Active);
    }
}
