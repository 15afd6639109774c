//! 监视器运行指标
//!
//! 原子计数器，轮询线程写入，任意线程读取快照。

use std::sync::atomic::{AtomicU64, Ordering};

/// 单臂监视器计数器
#[derive(Debug, Default)]
pub struct MonitorMetrics {
    /// 连接尝试次数
    pub connect_attempts: AtomicU64,
    /// 连接失败次数
    pub connect_failures: AtomicU64,
    /// 成功的位置读取次数
    pub polls: AtomicU64,
    /// 读取失败次数（每次都会导致断开重连）
    pub read_failures: AtomicU64,
    /// 断开次数（读取失败 / 暂停 / 停止）
    pub disconnects: AtomicU64,
}

impl MonitorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub polls: u64,
    pub read_failures: u64,
    pub disconnects: u64,
}

impl MetricsSnapshot {
    /// 连接成功次数
    pub fn connects(&self) -> u64 {
        self.connect_attempts.saturating_sub(self.connect_failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let metrics = MonitorMetrics::new();
        MonitorMetrics::incr(&metrics.connect_attempts);
        MonitorMetrics::incr(&metrics.connect_attempts);
        MonitorMetrics::incr(&metrics.connect_failures);
        MonitorMetrics::incr(&metrics.polls);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connect_attempts, 2);
        assert_eq!(snapshot.connects(), 1);
        assert_eq!(snapshot.polls, 1);
        assert_eq!(snapshot.read_failures, 0);
    }
}
