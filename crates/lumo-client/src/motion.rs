//! 安全单关节运动
//!
//! Feetech 的同步写会同时驱动所有关节，因此目标表必须完整：
//! 先读取所有关节的当前位置，只替换被移动的那一个，再整表写入。
//! 整个序列在从臂总线锁内执行，轮询线程无法插入。

use crate::error::ArmError;
use lumo_driver::ArmMonitor;
use lumo_protocol::{JointArray, JointName, Register};
use lumo_tools::CalibrationStore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_SPEED: i32 = 50;
pub const DEFAULT_ACCELERATION: i32 = 50;
/// 加速度寄存器上限
pub const MAX_ACCELERATION: i32 = 254;

fn default_speed() -> i32 {
    DEFAULT_SPEED
}

fn default_acceleration() -> i32 {
    DEFAULT_ACCELERATION
}

/// 单关节运动请求
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointMoveRequest {
    pub joint: JointName,
    /// 目标角度（夹爪为百分比）
    pub angle: f64,
    /// 速度百分比，超出 `[0, 100]` 时截断
    #[serde(default = "default_speed")]
    pub speed: i32,
    /// 超出 `[0, 254]` 时截断
    #[serde(default = "default_acceleration")]
    pub acceleration: i32,
}

impl JointMoveRequest {
    pub fn new(joint: JointName, angle: f64) -> Self {
        Self {
            joint,
            angle,
            speed: DEFAULT_SPEED,
            acceleration: DEFAULT_ACCELERATION,
        }
    }

    pub fn speed(mut self, speed: i32) -> Self {
        self.speed = speed;
        self
    }

    pub fn acceleration(mut self, acceleration: i32) -> Self {
        self.acceleration = acceleration;
        self
    }

    pub fn clamped_speed(&self) -> i32 {
        self.speed.clamp(0, 100)
    }

    pub fn clamped_acceleration(&self) -> u8 {
        self.acceleration.clamp(0, MAX_ACCELERATION) as u8
    }
}

/// 运动结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JointMoveReport {
    pub joint: JointName,
    /// 实际下发的目标（截断后）
    pub angle_sent: f64,
    pub requested: f64,
    pub clamped: bool,
    pub goal_velocity: u16,
    pub acceleration: u8,
}

/// 速度百分比 → `Goal_Velocity` 寄存器值
///
/// 100% 写 0（舵机最大速度）；其余按 `50 + (99 - pct) / 99 * 1950` 线性映射，
/// 结果至少为 1（0 会被舵机解释为不限速）。
pub fn goal_velocity(speed_pct: i32) -> u16 {
    let pct = speed_pct.clamp(0, 100);
    if pct == 100 {
        return 0;
    }
    let value = 50.0 + f64::from(99 - pct) / 99.0 * 1950.0;
    value.round().max(1.0) as u16
}

/// 在指定手臂上执行一次单关节运动
///
/// 顺序：离线检查（不触碰总线）→ 读取限位并截断 → 读取当前位置 →
/// 写 `Goal_Velocity` → 写 `Acceleration` → 写完整的 `Goal_Position` → 使能扭矩。
/// 失败不会修改监视器状态。
pub fn move_joint(
    monitor: &ArmMonitor,
    calibration: &CalibrationStore,
    request: &JointMoveRequest,
) -> Result<JointMoveReport, ArmError> {
    let role = monitor.role();
    if !monitor.is_connected() {
        return Err(ArmError::Offline { role });
    }
    if !request.angle.is_finite() {
        return Err(ArmError::InvalidRequest(format!(
            "angle for {} must be finite",
            request.joint
        )));
    }

    // 每次运动都重新读取标定文件
    let limit = calibration.clamp_limits(role).get_or_fallback(request.joint);
    let (angle, clamped) = limit.clamp(request.angle);
    if clamped {
        warn!(
            "Clamped {} target {:.1} to {:.1} (limits {:.1}..{:.1})",
            request.joint, request.angle, angle, limit.min, limit.max
        );
    }

    let velocity = goal_velocity(request.clamped_speed());
    let acceleration = request.clamped_acceleration();

    monitor.with_bus(|bus| -> Result<(), ArmError> {
        let present = bus
            .sync_read(Register::PresentPosition)
            .map_err(ArmError::Actuation)?;
        let missing = present.missing();
        let Some(mut goal) = present.transpose() else {
            let names: Vec<&str> = missing.iter().map(|j| j.as_str()).collect();
            return Err(ArmError::Read(format!(
                "missing present position for {}",
                names.join(", ")
            )));
        };
        goal[request.joint] = angle;

        bus.sync_write(Register::GoalVelocity, &JointArray::splat(f64::from(velocity)))
            .map_err(ArmError::Actuation)?;
        bus.sync_write(Register::Acceleration, &JointArray::splat(f64::from(acceleration)))
            .map_err(ArmError::Actuation)?;
        bus.sync_write(Register::GoalPosition, &goal)
            .map_err(ArmError::Actuation)?;
        bus.enable_torque().map_err(ArmError::Actuation)
    })??;

    info!(
        "Moved {} {} to {:.1} (velocity {}, acceleration {})",
        role, request.joint, angle, velocity, acceleration
    );
    Ok(JointMoveReport {
        joint: request.joint,
        angle_sent: angle,
        requested: request.angle,
        clamped,
        goal_velocity: velocity,
        acceleration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumo_bus::BusError;
    use lumo_bus::mock::{BusCall, MockBusFactory};
    use lumo_driver::MonitorConfig;
    use lumo_protocol::ArmRole;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const CALIBRATION: &str = r#"{
        "shoulder_pan": {"id": 1, "drive_mode": 0, "homing_offset": 0, "range_min": 943, "range_max": 3337},
        "shoulder_lift": {"id": 2, "drive_mode": 0, "homing_offset": 0, "range_min": 775, "range_max": 3266},
        "elbow_flex": {"id": 3, "drive_mode": 0, "homing_offset": 0, "range_min": 890, "range_max": 3081},
        "wrist_flex": {"id": 4, "drive_mode": 0, "homing_offset": 0, "range_min": 652, "range_max": 3222},
        "wrist_roll": {"id": 5, "drive_mode": 0, "homing_offset": 0, "range_min": 0, "range_max": 4095},
        "gripper": {"id": 6, "drive_mode": 0, "homing_offset": 0, "range_min": 2000, "range_max": 3500}
    }"#;

    struct Fixture {
        factory: MockBusFactory,
        monitor: ArmMonitor,
        store: CalibrationStore,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        fixture_polling(Duration::from_millis(5))
    }

    fn fixture_polling(poll_interval: Duration) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("follower.json");
        std::fs::write(&path, CALIBRATION).unwrap();
        let store = CalibrationStore::new(dir.path()).with_path(ArmRole::Follower, path);

        let factory = MockBusFactory::new();
        let monitor = ArmMonitor::new(
            ArmRole::Follower,
            "/dev/ttyACM1",
            Arc::new(factory.clone()),
            MonitorConfig {
                poll_interval,
                retry_delay: Duration::from_millis(20),
                join_timeout: Duration::from_secs(2),
            },
        );
        Fixture {
            factory,
            monitor,
            store,
            _dir: dir,
        }
    }

    fn connected(fixture: &Fixture) {
        fixture.monitor.start().unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while !fixture.monitor.is_connected() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(fixture.monitor.is_connected());
    }

    #[test]
    fn test_goal_velocity_scenarios() {
        assert_eq!(goal_velocity(100), 0);
        assert_eq!(goal_velocity(30), 1409);
        assert_eq!(goal_velocity(99), 50);
        assert_eq!(goal_velocity(0), 2000);
        assert_eq!(goal_velocity(150), 0);
        assert_eq!(goal_velocity(-5), 2000);
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: JointMoveRequest =
            serde_json::from_str(r#"{"joint": "elbow_flex", "angle": 12.5}"#).unwrap();
        assert_eq!(request, JointMoveRequest::new(JointName::ElbowFlex, 12.5));
        assert_eq!(request.speed, 50);
        assert_eq!(request.acceleration, 50);
    }

    #[test]
    fn test_offline_guard_touches_no_bus() {
        let fixture = fixture();
        let request = JointMoveRequest::new(JointName::ShoulderPan, 10.0);
        let result = move_joint(&fixture.monitor, &fixture.store, &request);
        assert!(matches!(result, Err(ArmError::Offline { role: ArmRole::Follower })));
        assert!(fixture.factory.log().calls().is_empty());
    }

    #[test]
    fn test_move_writes_in_order_with_full_goal_map() {
        let fixture = fixture();
        connected(&fixture);
        let log = fixture.factory.log();
        let mut present = JointArray::splat(Some(5.0));
        present[JointName::Gripper] = Some(40.0);
        log.set_positions(present);

        let request = JointMoveRequest::new(JointName::ElbowFlex, 20.0).speed(30);
        let report = move_joint(&fixture.monitor, &fixture.store, &request).unwrap();
        assert_eq!(report.angle_sent, 20.0);
        assert!(!report.clamped);
        assert_eq!(report.goal_velocity, 1409);
        assert_eq!(report.acceleration, 50);

        let writes = log.writes();
        let registers: Vec<Register> = writes.iter().map(|(r, _)| *r).collect();
        assert_eq!(
            registers,
            vec![Register::GoalVelocity, Register::Acceleration, Register::GoalPosition]
        );
        assert_eq!(writes[0].1, JointArray::splat(1409.0));
        assert_eq!(writes[1].1, JointArray::splat(50.0));

        let goal = writes[2].1;
        assert_eq!(goal[JointName::ElbowFlex], 20.0);
        assert_eq!(goal[JointName::Gripper], 40.0);
        assert_eq!(goal[JointName::ShoulderPan], 5.0);

        let torque = log.position(|c| matches!(c, BusCall::EnableTorque { .. })).unwrap();
        let goal_write = log
            .position(|c| matches!(c, BusCall::SyncWrite { register: Register::GoalPosition, .. }))
            .unwrap();
        assert!(goal_write < torque);
    }

    #[test]
    fn test_move_clamps_to_calibration_limits() {
        let fixture = fixture();
        connected(&fixture);

        let request = JointMoveRequest::new(JointName::ShoulderPan, 150.0);
        let report = move_joint(&fixture.monitor, &fixture.store, &request).unwrap();
        assert!(report.clamped);
        assert_eq!(report.requested, 150.0);
        assert_eq!(report.angle_sent, 105.2);

        let (_, goal) = fixture.factory.log().writes().pop().unwrap();
        assert_eq!(goal[JointName::ShoulderPan], 105.2);
    }

    #[test]
    fn test_move_without_calibration_uses_fallback() {
        let fixture = fixture();
        connected(&fixture);
        let store = CalibrationStore::new(fixture._dir.path().join("missing"));

        let report = move_joint(
            &fixture.monitor,
            &store,
            &JointMoveRequest::new(JointName::Gripper, 130.0),
        )
        .unwrap();
        assert_eq!(report.angle_sent, 100.0);

        let report = move_joint(
            &fixture.monitor,
            &store,
            &JointMoveRequest::new(JointName::WristFlex, -200.0),
        )
        .unwrap();
        assert_eq!(report.angle_sent, -180.0);
    }

    #[test]
    fn test_missing_present_position_aborts_before_writes() {
        let fixture = fixture();
        connected(&fixture);
        let log = fixture.factory.log();
        log.set_position(JointName::WristRoll, None);

        let result = move_joint(
            &fixture.monitor,
            &fixture.store,
            &JointMoveRequest::new(JointName::ShoulderLift, 0.0),
        );
        match result {
            Err(ArmError::Read(msg)) => assert!(msg.contains("wrist_roll")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(log.writes().is_empty());
        assert_eq!(log.count(|c| matches!(c, BusCall::EnableTorque { .. })), 0);
    }

    #[test]
    fn test_present_position_read_failure_is_actuation_error() {
        // 慢轮询：首轮读取完成后监视器不会在运动期间再次读取
        let fixture = fixture_polling(Duration::from_secs(10));
        connected(&fixture);
        let log = fixture.factory.log();
        log.fail_reads(true);

        let result = move_joint(
            &fixture.monitor,
            &fixture.store,
            &JointMoveRequest::new(JointName::ElbowFlex, 10.0),
        );
        assert!(matches!(result, Err(ArmError::Actuation(BusError::Timeout))));
        assert!(log.writes().is_empty());
        assert_eq!(log.count(|c| matches!(c, BusCall::EnableTorque { .. })), 0);
        fixture.monitor.stop();
    }

    #[test]
    fn test_write_failure_is_actuation_error() {
        let fixture = fixture();
        connected(&fixture);
        let log = fixture.factory.log();
        log.fail_write(Some(Register::Acceleration));

        let result = move_joint(
            &fixture.monitor,
            &fixture.store,
            &JointMoveRequest::new(JointName::ShoulderLift, 0.0),
        );
        assert!(matches!(result, Err(ArmError::Actuation(_))));
        assert_eq!(
            log.count(|c| matches!(c, BusCall::SyncWrite { register: Register::GoalPosition, .. })),
            0
        );
        // 监视器仍在线
        assert!(fixture.monitor.is_connected());
    }

    #[test]
    fn test_non_finite_angle_rejected() {
        let fixture = fixture();
        connected(&fixture);
        fixture.factory.log().clear();

        let result = move_joint(
            &fixture.monitor,
            &fixture.store,
            &JointMoveRequest::new(JointName::ShoulderLift, f64::NAN),
        );
        assert!(matches!(result, Err(ArmError::InvalidRequest(_))));
        assert!(fixture.factory.log().writes().is_empty());
    }

    proptest! {
        #[test]
        fn prop_speed_and_acceleration_clamped(speed in any::<i32>(), acceleration in any::<i32>()) {
            let request = JointMoveRequest::new(JointName::Gripper, 0.0)
                .speed(speed)
                .acceleration(acceleration);
            prop_assert!((0..=100).contains(&request.clamped_speed()));
            prop_assert!(i32::from(request.clamped_acceleration()) <= MAX_ACCELERATION);
            let velocity = goal_velocity(speed);
            prop_assert!(velocity <= 2000);
            prop_assert!(velocity == 0 || velocity >= 50);
        }

        #[test]
        fn prop_velocity_decreases_with_speed(a in 0i32..100, b in 0i32..100) {
            prop_assume!(a < b);
            prop_assert!(goal_velocity(a) >= goal_velocity(b));
        }
    }
}
