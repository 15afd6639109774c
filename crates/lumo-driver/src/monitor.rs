//! 单臂监视器
//!
//! 每只手臂一个后台线程，负责串口连接的完整生命周期：
//!
//! ```text
//!            ┌──────── 连接失败（等待 retry_delay）───────┐
//!            ▼                                           │
//! Disconnected ──connect(handshake)──▶ Connected ──读取失败──┘
//!            ▲                           │
//!            └──────── pause() ──────────┘   （Paused 期间不触碰串口）
//! ```
//!
//! # 锁
//!
//! - 总线槽 `Mutex<Option<Box<dyn ServoBus>>>`：串行化轮询线程与运动流水线的所有 IO，
//!   同时也是该手臂唯一的独占点（`pause()` 必须获取它）
//! - 快照 `RwLock<SingleArmStatus>`：只在 IO 完成后短暂持有

use crate::builder::{MonitorBuilder, MonitorConfig};
use crate::error::DriverError;
use crate::metrics::{MetricsSnapshot, MonitorMetrics};
use crate::mode::{AtomicMonitorMode, MonitorMode};
use crate::state::SingleArmStatus;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use lumo_bus::{BusFactory, ServoBus};
use lumo_protocol::{ArmRole, Register};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// JoinHandle::join with timeout
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // watchdog 线程负责 join，超时后继续在后台等待
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 监视器生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorLifecycle {
    /// 已构造，线程未启动
    Idle,
    Running,
    /// 已停止（不可重启）
    Stopped,
}

struct Control {
    lifecycle: MonitorLifecycle,
    // drop 即通知线程退出
    shutdown_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

/// 轮询线程与外部调用者共享的状态
struct Shared {
    role: ArmRole,
    port: String,
    config: MonitorConfig,
    factory: Arc<dyn BusFactory>,
    bus: Mutex<Option<Box<dyn ServoBus>>>,
    status: RwLock<SingleArmStatus>,
    mode: AtomicMonitorMode,
    metrics: MonitorMetrics,
}

impl Shared {
    fn publish_offline(&self) {
        *self.status.write() = SingleArmStatus::offline(&self.port);
    }

    /// 断开并丢弃当前总线（不改变扭矩状态，错误忽略）
    fn release(&self, slot: &mut Option<Box<dyn ServoBus>>, reason: &str) {
        if let Some(mut bus) = slot.take() {
            if let Err(e) = bus.disconnect(false) {
                debug!("{} arm: disconnect on {} failed ({}): {}", self.role, self.port, reason, e);
            }
            MonitorMetrics::incr(&self.metrics.disconnects);
            debug!("{} arm: released {} ({})", self.role, self.port, reason);
        }
        self.publish_offline();
    }

    /// 执行一轮轮询，返回下一轮前的等待时间
    fn tick(&self, failures: &mut u64) -> Duration {
        if self.mode.is_paused() {
            return self.config.poll_interval;
        }

        let mut slot = self.bus.lock();
        // 等锁期间可能已被暂停
        if self.mode.is_paused() {
            return self.config.poll_interval;
        }

        if slot.is_none() {
            MonitorMetrics::incr(&self.metrics.connect_attempts);
            let mut bus = self.factory.create(&self.port, self.role);
            if let Err(e) = bus.connect(true) {
                MonitorMetrics::incr(&self.metrics.connect_failures);
                if *failures == 0 {
                    warn!("{} arm: cannot connect on {}: {}", self.role, self.port, e);
                } else {
                    debug!("{} arm: connect retry {} on {} failed: {}", self.role, failures, self.port, e);
                }
                *failures += 1;
                return self.config.retry_delay;
            }

            // pause() 可能在连接期间发生：在锁内重新检查
            if self.mode.is_paused() {
                if let Err(e) = bus.disconnect(false) {
                    debug!("{} arm: disconnect after paused connect failed: {}", self.role, e);
                }
                return self.config.poll_interval;
            }

            info!("{} arm connected on {}", self.role, self.port);
            *failures = 0;
            *slot = Some(bus);
        }

        let Some(bus) = slot.as_mut() else {
            return self.config.poll_interval;
        };

        match bus.sync_read(Register::PresentPosition) {
            Ok(positions) => {
                MonitorMetrics::incr(&self.metrics.polls);
                trace!("{} arm positions: {:?}", self.role, positions);
                *self.status.write() = SingleArmStatus::online(&self.port, &positions);
            },
            Err(e) => {
                MonitorMetrics::incr(&self.metrics.read_failures);
                warn!("{} arm: read failed on {}, reconnecting: {}", self.role, self.port, e);
                self.release(&mut slot, "read failure");
            },
        }
        self.config.poll_interval
    }

    fn run(self: Arc<Self>, shutdown: Receiver<()>) {
        info!("{} arm monitor started on {}", self.role, self.port);
        let mut failures = 0u64;
        loop {
            let delay = self.tick(&mut failures);
            match shutdown.recv_timeout(delay) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.release(&mut self.bus.lock(), "monitor stopped");
        info!("{} arm monitor stopped on {}", self.role, self.port);
    }
}

/// 单臂监视器
///
/// 由 [`DualArm`](crate::DualArm) 持有；drop 时自动停止。
pub struct ArmMonitor {
    shared: Arc<Shared>,
    control: Mutex<Control>,
}

impl ArmMonitor {
    /// 创建监视器（不启动线程，不做任何 IO）
    pub fn new(
        role: ArmRole,
        port: impl Into<String>,
        factory: Arc<dyn BusFactory>,
        config: MonitorConfig,
    ) -> Self {
        let port = port.into();
        Self {
            shared: Arc::new(Shared {
                role,
                status: RwLock::new(SingleArmStatus::offline(&port)),
                port,
                config,
                factory,
                bus: Mutex::new(None),
                mode: AtomicMonitorMode::new(MonitorMode::Active),
                metrics: MonitorMetrics::new(),
            }),
            control: Mutex::new(Control {
                lifecycle: MonitorLifecycle::Idle,
                shutdown_tx: None,
                thread: None,
            }),
        }
    }

    pub fn builder(role: ArmRole) -> MonitorBuilder {
        MonitorBuilder::new(role)
    }

    /// 启动轮询线程
    ///
    /// 已运行时为空操作；已停止的监视器不能重启。
    pub fn start(&self) -> Result<(), DriverError> {
        let mut control = self.control.lock();
        match control.lifecycle {
            MonitorLifecycle::Running => return Ok(()),
            MonitorLifecycle::Stopped => {
                return Err(DriverError::MonitorThread(format!(
                    "{} monitor on {} was stopped and cannot be restarted",
                    self.shared.role, self.shared.port
                )));
            },
            MonitorLifecycle::Idle => {},
        }

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(0);
        let shared = self.shared.clone();
        let handle = std::thread::Builder::new()
            .name(format!("lumo-monitor-{}", self.shared.role))
            .spawn(move || shared.run(shutdown_rx))
            .map_err(|e| DriverError::MonitorThread(e.to_string()))?;

        control.shutdown_tx = Some(shutdown_tx);
        control.thread = Some(handle);
        control.lifecycle = MonitorLifecycle::Running;
        Ok(())
    }

    /// 让出串口
    ///
    /// 返回时串口已关闭（等待进行中的 IO 完成），扭矩状态不变。幂等。
    pub fn pause(&self) {
        let previous = self.shared.mode.swap(MonitorMode::Paused, Ordering::AcqRel);
        let mut slot = self.shared.bus.lock();
        self.shared.release(&mut slot, "paused");
        if !previous.is_paused() {
            info!("{} arm monitor paused, {} released", self.shared.role, self.shared.port);
        }
    }

    /// 恢复轮询（下一轮重新连接）
    pub fn resume(&self) {
        let previous = self.shared.mode.swap(MonitorMode::Active, Ordering::AcqRel);
        if previous.is_paused() {
            info!("{} arm monitor resumed on {}", self.shared.role, self.shared.port);
        }
    }

    /// 停止线程并释放串口
    ///
    /// 只有第一次调用生效。
    pub fn stop(&self) {
        let (shutdown_tx, thread) = {
            let mut control = self.control.lock();
            if control.lifecycle == MonitorLifecycle::Stopped {
                return;
            }
            control.lifecycle = MonitorLifecycle::Stopped;
            (control.shutdown_tx.take(), control.thread.take())
        };

        drop(shutdown_tx);
        if let Some(handle) = thread
            && let Err(_e) = handle.join_timeout(self.shared.config.join_timeout)
        {
            error!(
                "{} monitor thread panicked or failed to shut down within {:?}",
                self.shared.role, self.shared.config.join_timeout
            );
        }

        // 线程未启动或未能及时退出时由这里兜底释放
        if let Some(mut slot) = self.shared.bus.try_lock_for(self.shared.config.join_timeout) {
            self.shared.release(&mut slot, "monitor stopped");
        }
    }

    /// 当前状态快照
    pub fn status(&self) -> SingleArmStatus {
        self.shared.status.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.status.read().connected()
    }

    pub fn is_paused(&self) -> bool {
        self.shared.mode.is_paused()
    }

    pub fn port(&self) -> &str {
        &self.shared.port
    }

    pub fn role(&self) -> ArmRole {
        self.shared.role
    }

    pub fn lifecycle(&self) -> MonitorLifecycle {
        self.control.lock().lifecycle
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// 在总线锁内使用已连接的总线
    ///
    /// 未连接或已暂停时返回 `Offline`，且不触碰任何总线。
    /// 持锁期间轮询线程与 `pause()` 都会等待。
    pub fn with_bus<R>(&self, f: impl FnOnce(&mut dyn ServoBus) -> R) -> Result<R, DriverError> {
        let offline = || DriverError::Offline {
            role: self.shared.role,
        };
        if self.shared.mode.is_paused() {
            return Err(offline());
        }
        let mut slot = self.shared.bus.lock();
        match slot.as_mut() {
            Some(bus) if bus.is_connected() => Ok(f(bus.as_mut())),
            _ => Err(offline()),
        }
    }
}

impl Drop for ArmMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ArmMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmMonitor")
            .field("role", &self.shared.role)
            .field("port", &self.shared.port)
            .field("lifecycle", &self.lifecycle())
            .field("paused", &self.is_paused())
            .finish()
    }
}
