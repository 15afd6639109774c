//! Mock 总线（测试替身）
//!
//! 所有 [`MockBus`] 共享一个 [`CallLog`]：按发生顺序记录每次总线调用（含端口），
//! 并可脚本化注入失败、设置当前位置、模拟 IO 延迟。

use crate::{BusDeviceError, BusDeviceErrorKind, BusError, BusFactory, ServoBus};
use lumo_protocol::{ArmRole, JointArray, JointName, Register};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// 一次总线调用
#[derive(Debug, Clone, PartialEq)]
pub enum BusCall {
    Create { port: String, role: ArmRole },
    Connect { port: String, handshake: bool },
    Disconnect { port: String, disable_torque: bool },
    SyncRead { port: String, register: Register },
    SyncWrite { port: String, register: Register, values: JointArray<f64> },
    EnableTorque { port: String },
}

impl BusCall {
    pub fn port(&self) -> &str {
        match self {
            BusCall::Create { port, .. }
            | BusCall::Connect { port, .. }
            | BusCall::Disconnect { port, .. }
            | BusCall::SyncRead { port, .. }
            | BusCall::SyncWrite { port, .. }
            | BusCall::EnableTorque { port } => port,
        }
    }

    /// 是否可能改变舵机状态（写寄存器 / 使能或释放扭矩）
    pub fn mutates_servos(&self) -> bool {
        matches!(
            self,
            BusCall::SyncWrite { .. }
                | BusCall::EnableTorque { .. }
                | BusCall::Disconnect {
                    disable_torque: true,
                    ..
                }
        )
    }
}

#[derive(Debug, Clone)]
struct Script {
    positions: JointArray<Option<f64>>,
    fail_connect: bool,
    fail_reads: bool,
    fail_disconnect: bool,
    fail_write: Option<Register>,
    fail_torque: bool,
    offline_ports: HashSet<String>,
    latency: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            positions: JointArray::splat(Some(0.0)),
            fail_connect: false,
            fail_reads: false,
            fail_disconnect: false,
            fail_write: None,
            fail_torque: false,
            offline_ports: HashSet::new(),
            latency: Duration::ZERO,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    calls: Mutex<Vec<BusCall>>,
    script: Mutex<Script>,
    // 端口 -> (当前打开数, 历史最大同时打开数)
    open: Mutex<HashMap<String, (usize, usize)>>,
}

/// 共享调用记录与故障脚本
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    shared: Arc<Shared>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: BusCall) {
        self.shared.calls.lock().push(call);
    }

    fn script(&self) -> Script {
        self.shared.script.lock().clone()
    }

    /// 全部调用（按发生顺序）
    pub fn calls(&self) -> Vec<BusCall> {
        self.shared.calls.lock().clone()
    }

    /// 某个端口上的调用
    pub fn calls_on(&self, port: &str) -> Vec<BusCall> {
        self.shared
            .calls
            .lock()
            .iter()
            .filter(|call| call.port() == port)
            .cloned()
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&BusCall) -> bool) -> usize {
        self.shared.calls.lock().iter().filter(|call| pred(call)).count()
    }

    /// 第一个满足条件的调用的序号
    pub fn position(&self, pred: impl Fn(&BusCall) -> bool) -> Option<usize> {
        self.shared.calls.lock().iter().position(pred)
    }

    /// 所有 `SyncWrite` 调用（寄存器, 值）
    pub fn writes(&self) -> Vec<(Register, JointArray<f64>)> {
        self.shared
            .calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                BusCall::SyncWrite {
                    register, values, ..
                } => Some((*register, *values)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.shared.calls.lock().clear();
    }

    /// 端口当前打开的连接数
    pub fn open_connections(&self, port: &str) -> usize {
        self.shared.open.lock().get(port).map_or(0, |(now, _)| *now)
    }

    /// 端口历史上同时打开的最大连接数
    pub fn max_open_connections(&self, port: &str) -> usize {
        self.shared.open.lock().get(port).map_or(0, |(_, max)| *max)
    }

    pub fn set_positions(&self, positions: JointArray<Option<f64>>) {
        self.shared.script.lock().positions = positions;
    }

    pub fn set_position(&self, joint: JointName, position: Option<f64>) {
        self.shared.script.lock().positions[joint] = position;
    }

    pub fn fail_connect(&self, fail: bool) {
        self.shared.script.lock().fail_connect = fail;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.shared.script.lock().fail_reads = fail;
    }

    pub fn fail_disconnect(&self, fail: bool) {
        self.shared.script.lock().fail_disconnect = fail;
    }

    /// 写入指定寄存器时失败
    pub fn fail_write(&self, register: Option<Register>) {
        self.shared.script.lock().fail_write = register;
    }

    pub fn fail_torque(&self, fail: bool) {
        self.shared.script.lock().fail_torque = fail;
    }

    /// 模拟某个端口上的设备不存在
    pub fn set_port_offline(&self, port: &str, offline: bool) {
        let mut script = self.shared.script.lock();
        if offline {
            script.offline_ports.insert(port.to_string());
        } else {
            script.offline_ports.remove(port);
        }
    }

    /// 每次读写调用的模拟耗时
    pub fn set_latency(&self, latency: Duration) {
        self.shared.script.lock().latency = latency;
    }

    fn opened(&self, port: &str) {
        let mut open = self.shared.open.lock();
        let entry = open.entry(port.to_string()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 = entry.1.max(entry.0);
    }

    fn closed(&self, port: &str) {
        if let Some(entry) = self.shared.open.lock().get_mut(port) {
            entry.0 = entry.0.saturating_sub(1);
        }
    }
}

/// Mock 总线
#[derive(Debug)]
pub struct MockBus {
    port: String,
    log: CallLog,
    connected: bool,
}

impl MockBus {
    pub fn new(port: impl Into<String>, log: CallLog) -> Self {
        Self {
            port: port.into(),
            log,
            connected: false,
        }
    }

    fn io_delay(&self, script: &Script) {
        if !script.latency.is_zero() {
            thread::sleep(script.latency);
        }
    }

    fn ensure_connected(&self) -> Result<(), BusError> {
        if self.connected {
            Ok(())
        } else {
            Err(BusError::NotConnected)
        }
    }

    fn close(&mut self) {
        if self.connected {
            self.connected = false;
            self.log.closed(&self.port);
        }
    }
}

impl ServoBus for MockBus {
    fn connect(&mut self, handshake: bool) -> Result<(), BusError> {
        self.log.record(BusCall::Connect {
            port: self.port.clone(),
            handshake,
        });
        let script = self.log.script();
        if script.fail_connect || script.offline_ports.contains(&self.port) {
            return Err(BusDeviceError::new(BusDeviceErrorKind::NotFound, self.port.clone()).into());
        }
        if !self.connected {
            self.connected = true;
            self.log.opened(&self.port);
        }
        Ok(())
    }

    fn disconnect(&mut self, disable_torque: bool) -> Result<(), BusError> {
        self.log.record(BusCall::Disconnect {
            port: self.port.clone(),
            disable_torque,
        });
        // 失败时链路同样被释放
        self.close();
        if self.log.script().fail_disconnect {
            return Err(BusDeviceError::new(BusDeviceErrorKind::Backend, "disconnect failed").into());
        }
        Ok(())
    }

    fn sync_read(&mut self, register: Register) -> Result<JointArray<Option<f64>>, BusError> {
        self.log.record(BusCall::SyncRead {
            port: self.port.clone(),
            register,
        });
        self.ensure_connected()?;
        let script = self.log.script();
        self.io_delay(&script);
        if script.fail_reads {
            return Err(BusError::Timeout);
        }
        Ok(script.positions)
    }

    fn sync_write(&mut self, register: Register, values: &JointArray<f64>) -> Result<(), BusError> {
        self.log.record(BusCall::SyncWrite {
            port: self.port.clone(),
            register,
            values: *values,
        });
        self.ensure_connected()?;
        let script = self.log.script();
        self.io_delay(&script);
        if !register.is_writable() {
            return Err(BusError::ReadOnly(register));
        }
        if script.fail_write == Some(register) {
            return Err(BusError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                format!("write {} failed", register),
            )));
        }
        Ok(())
    }

    fn enable_torque(&mut self) -> Result<(), BusError> {
        self.log.record(BusCall::EnableTorque {
            port: self.port.clone(),
        });
        self.ensure_connected()?;
        if self.log.script().fail_torque {
            return Err(BusError::Timeout);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl Drop for MockBus {
    fn drop(&mut self) {
        self.close();
    }
}

/// 构造共享同一 [`CallLog`] 的 [`MockBus`]
#[derive(Debug, Clone, Default)]
pub struct MockBusFactory {
    log: CallLog,
}

impl MockBusFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: CallLog) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }
}

impl BusFactory for MockBusFactory {
    fn create(&self, port: &str, role: ArmRole) -> Box<dyn ServoBus> {
        self.log.record(BusCall::Create {
            port: port.to_string(),
            role,
        });
        Box::new(MockBus::new(port, self.log.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_calls_in_order() {
        let factory = MockBusFactory::new();
        let mut bus = factory.create("/dev/ttyACM1", ArmRole::Follower);
        bus.connect(true).unwrap();
        bus.sync_read(Register::PresentPosition).unwrap();
        bus.disconnect(false).unwrap();

        let calls = factory.log().calls();
        assert_eq!(calls.len(), 4);
        assert!(matches!(calls[0], BusCall::Create { role: ArmRole::Follower, .. }));
        assert!(matches!(calls[1], BusCall::Connect { handshake: true, .. }));
        assert!(matches!(calls[3], BusCall::Disconnect { disable_torque: false, .. }));
        assert!(calls.iter().all(|c| c.port() == "/dev/ttyACM1"));
        assert!(!calls.iter().any(BusCall::mutates_servos));
    }

    #[test]
    fn test_scripted_failures() {
        let log = CallLog::new();
        let mut bus = MockBus::new("/dev/ttyACM0", log.clone());

        log.fail_connect(true);
        assert!(bus.connect(true).is_err());
        assert!(!bus.is_connected());

        log.fail_connect(false);
        bus.connect(true).unwrap();

        log.fail_reads(true);
        assert!(matches!(
            bus.sync_read(Register::PresentPosition),
            Err(BusError::Timeout)
        ));

        log.fail_write(Some(Register::GoalPosition));
        assert!(bus
            .sync_write(Register::GoalVelocity, &JointArray::splat(0.0))
            .is_ok());
        assert!(bus
            .sync_write(Register::GoalPosition, &JointArray::splat(0.0))
            .is_err());

        log.fail_disconnect(true);
        assert!(bus.disconnect(false).is_err());
        assert!(!bus.is_connected());
    }

    #[test]
    fn test_open_connection_tracking() {
        let log = CallLog::new();
        {
            let mut bus = MockBus::new("/dev/ttyACM0", log.clone());
            bus.connect(true).unwrap();
            assert_eq!(log.open_connections("/dev/ttyACM0"), 1);
        }
        // drop 释放连接
        assert_eq!(log.open_connections("/dev/ttyACM0"), 0);
        assert_eq!(log.max_open_connections("/dev/ttyACM0"), 1);
    }

    #[test]
    fn test_offline_port() {
        let log = CallLog::new();
        log.set_port_offline("/dev/ttyACM5", true);
        let mut offline = MockBus::new("/dev/ttyACM5", log.clone());
        let mut online = MockBus::new("/dev/ttyACM1", log.clone());
        assert!(offline.connect(true).is_err());
        assert!(online.connect(true).is_ok());
    }

    #[test]
    fn test_positions() {
        let log = CallLog::new();
        log.set_position(JointName::Gripper, Some(50.0));
        log.set_position(JointName::WristRoll, None);
        let mut bus = MockBus::new("/dev/ttyACM1", log.clone());
        bus.connect(false).unwrap();
        let positions = bus.sync_read(Register::PresentPosition).unwrap();
        assert_eq!(positions[JointName::Gripper], Some(50.0));
        assert_eq!(positions.missing(), vec![JointName::WristRoll]);
    }
}
