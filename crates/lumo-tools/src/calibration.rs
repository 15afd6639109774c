//! # 标定加载
//!
//! 读取 LeRobot 生成的每臂标定文件（JSON，以关节名为键），
//! 推导各关节的工程单位限位。
//!
//! 标定文件不缓存：每次查询、每次运动前都重新读取，
//! 操作员修改标定后无需重启服务。

use lumo_protocol::{ArmRole, JointArray, JointName, MAX_RESOLUTION, NormMode, RawRange};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 标定根目录环境变量
pub const CALIBRATION_ENV: &str = "HF_LEROBOT_CALIBRATION";

pub const DEFAULT_LEADER_ID: &str = "beluga_leader";
pub const DEFAULT_FOLLOWER_ID: &str = "beluga_follower";

/// 单个关节的标定记录（原始编码器值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationEntry {
    pub id: u8,
    pub drive_mode: u8,
    pub homing_offset: i32,
    pub range_min: u16,
    pub range_max: u16,
}

impl CalibrationEntry {
    /// 转换为协议层的原始范围
    pub fn raw_range(&self) -> RawRange {
        RawRange::new(self.range_min, self.range_max, self.drive_mode == 1)
    }

    /// 推导该关节的限位
    ///
    /// - 旋转关节：`half = (max - min) / 2 * 360 / 4095`，限位 `[-half, half]`
    /// - 夹爪：固定 `[0, 100]`
    ///
    /// `range_min > range_max` 的记录视为无效，使用默认限位。
    pub fn limit(&self, joint: JointName) -> JointLimit {
        if joint.is_gripper() {
            return JointLimit::GRIPPER;
        }
        if self.range_min > self.range_max {
            warn!(
                "Inverted calibration range for {} ({} > {}), using default limits",
                joint, self.range_min, self.range_max
            );
            return JointLimit::fallback(joint);
        }
        let span = self.range_max as f64 - self.range_min as f64;
        let half = round1(span / 2.0 * 360.0 / MAX_RESOLUTION);
        JointLimit::new(-half, half)
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// 一只手臂的完整标定
///
/// 文件中缺失的关节为 `None`，未知键被忽略。
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    entries: JointArray<Option<CalibrationEntry>>,
}

impl Calibration {
    pub fn new(entries: JointArray<Option<CalibrationEntry>>) -> Self {
        Self { entries }
    }

    /// 解析标定 JSON
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, CalibrationEntry> = serde_json::from_str(text)?;
        let entries = JointArray::from_fn(|joint| raw.get(joint.as_str()).copied());
        Ok(Self { entries })
    }

    pub fn entry(&self, joint: JointName) -> Option<&CalibrationEntry> {
        self.entries[joint].as_ref()
    }

    pub fn entries(&self) -> &JointArray<Option<CalibrationEntry>> {
        &self.entries
    }

    /// 总线地址（缺失时使用默认地址）
    pub fn ids(&self) -> JointArray<u8> {
        self.entries
            .map(|joint, entry| entry.map_or(joint.default_id(), |e| e.id))
    }

    /// 各关节原始范围
    pub fn raw_ranges(&self) -> JointArray<Option<RawRange>> {
        self.entries.map(|_, entry| entry.map(|e| e.raw_range()))
    }

    /// 各关节归一化模式
    pub fn norm_modes() -> JointArray<NormMode> {
        JointArray::from_fn(|joint| {
            if joint.is_gripper() {
                NormMode::Range0To100
            } else {
                NormMode::Degrees
            }
        })
    }
}

/// 单关节限位（度或百分比），序列化为 `{"min": .., "max": ..}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JointLimit {
    pub min: f64,
    pub max: f64,
}

impl JointLimit {
    /// 无标定时旋转关节的默认限位
    pub const FALLBACK_DEGREES: JointLimit = JointLimit {
        min: -180.0,
        max: 180.0,
    };

    pub const GRIPPER: JointLimit = JointLimit {
        min: 0.0,
        max: 100.0,
    };

    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn fallback(joint: JointName) -> Self {
        if joint.is_gripper() {
            Self::GRIPPER
        } else {
            Self::FALLBACK_DEGREES
        }
    }

    /// 限制到 `[min, max]`，返回 `(值, 是否被限制)`
    pub fn clamp(&self, value: f64) -> (f64, bool) {
        let clamped = value.max(self.min).min(self.max);
        (clamped, clamped != value)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// 一只手臂的关节限位表
///
/// 只包含标定文件中存在的关节；序列化为 `{joint: {min, max}}`。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointLimits(JointArray<Option<JointLimit>>);

impl JointLimits {
    pub fn from_calibration(calibration: &Calibration) -> Self {
        Self(
            calibration
                .entries()
                .map(|joint, entry| entry.map(|e| e.limit(joint))),
        )
    }

    pub fn get(&self, joint: JointName) -> Option<JointLimit> {
        self.0[joint]
    }

    /// 有标定时返回标定限位，否则返回默认限位
    pub fn get_or_fallback(&self, joint: JointName) -> JointLimit {
        self.0[joint].unwrap_or_else(|| JointLimit::fallback(joint))
    }

    /// 用默认限位补齐缺失关节
    pub fn with_fallbacks(&self) -> Self {
        Self(self.0.map(|joint, _| Some(self.get_or_fallback(joint))))
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|(_, limit)| limit.is_none())
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointName, JointLimit)> + '_ {
        self.0
            .iter()
            .filter_map(|(joint, limit)| limit.map(|limit| (joint, limit)))
    }
}

impl Serialize for JointLimits {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        for (joint, limit) in self.iter() {
            map.serialize_entry(joint.as_str(), &limit)?;
        }
        map.end()
    }
}

/// 两只手臂的限位（标定缺失时为空表）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoleLimits {
    pub leader: JointLimits,
    pub follower: JointLimits,
}

/// 标定文件定位与读取
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    root: PathBuf,
    leader_id: String,
    follower_id: String,
    leader_path: Option<PathBuf>,
    follower_path: Option<PathBuf>,
}

impl CalibrationStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            leader_id: DEFAULT_LEADER_ID.to_string(),
            follower_id: DEFAULT_FOLLOWER_ID.to_string(),
            leader_path: None,
            follower_path: None,
        }
    }

    /// 使用默认根目录（`$HF_LEROBOT_CALIBRATION` 或 `~/.cache/huggingface/lerobot/calibration`）
    pub fn from_env() -> Self {
        Self::new(default_root())
    }

    /// 设置机器人 id（决定文件名）
    pub fn with_ids(mut self, leader_id: impl Into<String>, follower_id: impl Into<String>) -> Self {
        self.leader_id = leader_id.into();
        self.follower_id = follower_id.into();
        self
    }

    /// 显式指定某一角色的标定文件
    pub fn with_path(mut self, role: ArmRole, path: impl Into<PathBuf>) -> Self {
        match role {
            ArmRole::Leader => self.leader_path = Some(path.into()),
            ArmRole::Follower => self.follower_path = Some(path.into()),
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 角色对应的标定文件路径
    ///
    /// - follower: `robots/so_follower/<follower_id>.json`
    /// - leader: `teleoperators/so_leader/<leader_id>.json`
    pub fn path(&self, role: ArmRole) -> PathBuf {
        let explicit = match role {
            ArmRole::Leader => &self.leader_path,
            ArmRole::Follower => &self.follower_path,
        };
        if let Some(path) = explicit {
            return path.clone();
        }
        match role {
            ArmRole::Leader => self
                .root
                .join("teleoperators")
                .join("so_leader")
                .join(format!("{}.json", self.leader_id)),
            ArmRole::Follower => self
                .root
                .join("robots")
                .join("so_follower")
                .join(format!("{}.json", self.follower_id)),
        }
    }

    /// 读取标定文件
    ///
    /// 文件不存在或无法解析时返回 `None`，从不向调用者报错。
    pub fn load(&self, role: ArmRole) -> Option<Calibration> {
        let path = self.path(role);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                debug!("No {} calibration at {}: {}", role, path.display(), e);
                return None;
            },
        };
        match Calibration::from_json(&text) {
            Ok(calibration) => Some(calibration),
            Err(e) => {
                warn!("Ignoring unparseable {} calibration {}: {}", role, path.display(), e);
                None
            },
        }
    }

    /// 标定限位（无标定时为 `None`）
    pub fn limits(&self, role: ArmRole) -> Option<JointLimits> {
        self.load(role).map(|c| JointLimits::from_calibration(&c))
    }

    /// 运动前使用的完整限位表（缺失关节使用默认限位）
    pub fn clamp_limits(&self, role: ArmRole) -> JointLimits {
        self.limits(role).unwrap_or_default().with_fallbacks()
    }

    /// 两只手臂的限位
    pub fn role_limits(&self) -> RoleLimits {
        RoleLimits {
            leader: self.limits(ArmRole::Leader).unwrap_or_default(),
            follower: self.limits(ArmRole::Follower).unwrap_or_default(),
        }
    }
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::from_env()
    }
}

/// 默认标定根目录
pub fn default_root() -> PathBuf {
    if let Some(dir) = std::env::var_os(CALIBRATION_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_default()
        .join(".cache")
        .join("huggingface")
        .join("lerobot")
        .join("calibration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FOLLOWER_JSON: &str = r#"{
        "shoulder_pan":  {"id": 1, "drive_mode": 0, "homing_offset": -2027, "range_min": 943,  "range_max": 3337},
        "shoulder_lift": {"id": 2, "drive_mode": 0, "homing_offset": -1001, "range_min": 775,  "range_max": 3266},
        "elbow_flex":    {"id": 3, "drive_mode": 0, "homing_offset": 1258,  "range_min": 890,  "range_max": 3081},
        "wrist_flex":    {"id": 4, "drive_mode": 0, "homing_offset": -1973, "range_min": 652,  "range_max": 3222},
        "wrist_roll":    {"id": 5, "drive_mode": 0, "homing_offset": -1883, "range_min": 0,    "range_max": 4095},
        "gripper":       {"id": 6, "drive_mode": 0, "homing_offset": 1107,  "range_min": 1925, "range_max": 3343}
    }"#;

    fn store_with(follower: Option<&str>, leader: Option<&str>) -> (TempDir, CalibrationStore) {
        let dir = TempDir::new().unwrap();
        let store = CalibrationStore::new(dir.path());
        for (role, text) in [(ArmRole::Follower, follower), (ArmRole::Leader, leader)] {
            if let Some(text) = text {
                let path = store.path(role);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, text).unwrap();
            }
        }
        (dir, store)
    }

    #[test]
    fn test_role_paths() {
        let store = CalibrationStore::new("/cal");
        assert_eq!(
            store.path(ArmRole::Follower),
            PathBuf::from("/cal/robots/so_follower/beluga_follower.json")
        );
        assert_eq!(
            store.path(ArmRole::Leader),
            PathBuf::from("/cal/teleoperators/so_leader/beluga_leader.json")
        );

        let store = store
            .with_ids("l2", "f2")
            .with_path(ArmRole::Leader, "/tmp/leader.json");
        assert_eq!(store.path(ArmRole::Leader), PathBuf::from("/tmp/leader.json"));
        assert_eq!(
            store.path(ArmRole::Follower),
            PathBuf::from("/cal/robots/so_follower/f2.json")
        );
    }

    #[test]
    fn test_real_calibration_limits() {
        let (_dir, store) = store_with(Some(FOLLOWER_JSON), None);
        let limits = store.limits(ArmRole::Follower).unwrap();

        assert_eq!(limits.get(JointName::ShoulderPan), Some(JointLimit::new(-105.2, 105.2)));
        assert_eq!(limits.get(JointName::ShoulderLift), Some(JointLimit::new(-109.5, 109.5)));
        assert_eq!(limits.get(JointName::ElbowFlex), Some(JointLimit::new(-96.3, 96.3)));
        assert_eq!(limits.get(JointName::WristFlex), Some(JointLimit::new(-113.0, 113.0)));
        assert_eq!(limits.get(JointName::WristRoll), Some(JointLimit::new(-180.0, 180.0)));
        assert_eq!(limits.get(JointName::Gripper), Some(JointLimit::GRIPPER));
    }

    #[test]
    fn test_missing_file_is_none() {
        let (_dir, store) = store_with(None, None);
        assert!(store.load(ArmRole::Follower).is_none());
        assert!(store.limits(ArmRole::Leader).is_none());

        let limits = store.role_limits();
        assert!(limits.leader.is_empty());
        assert!(limits.follower.is_empty());
    }

    #[test]
    fn test_unparseable_file_is_none() {
        let (_dir, store) = store_with(Some("{ not json"), None);
        assert!(store.load(ArmRole::Follower).is_none());
    }

    #[test]
    fn test_clamp_limits_fallbacks() {
        let (_dir, store) = store_with(None, None);
        let limits = store.clamp_limits(ArmRole::Follower);
        assert_eq!(limits.get(JointName::ElbowFlex), Some(JointLimit::FALLBACK_DEGREES));
        assert_eq!(limits.get(JointName::Gripper), Some(JointLimit::GRIPPER));

        // 部分关节缺失：仅缺失关节使用默认值，未知键忽略
        let partial = r#"{
            "elbow_flex": {"id": 3, "drive_mode": 0, "homing_offset": 0, "range_min": 890, "range_max": 3081},
            "tail": {"id": 9, "drive_mode": 0, "homing_offset": 0, "range_min": 0, "range_max": 10}
        }"#;
        let (_dir, store) = store_with(Some(partial), None);
        let limits = store.clamp_limits(ArmRole::Follower);
        assert_eq!(limits.get(JointName::ElbowFlex), Some(JointLimit::new(-96.3, 96.3)));
        assert_eq!(limits.get(JointName::ShoulderPan), Some(JointLimit::FALLBACK_DEGREES));
    }

    #[test]
    fn test_not_cached() {
        let (_dir, store) = store_with(Some(FOLLOWER_JSON), None);
        assert!(store.limits(ArmRole::Follower).is_some());

        fs::remove_file(store.path(ArmRole::Follower)).unwrap();
        assert!(store.limits(ArmRole::Follower).is_none());
    }

    #[test]
    fn test_clamp() {
        let limit = JointLimit::new(-105.2, 105.2);
        assert_eq!(limit.clamp(200.0), (105.2, true));
        assert_eq!(limit.clamp(-200.0), (-105.2, true));
        assert_eq!(limit.clamp(10.0), (10.0, false));
    }

    #[test]
    fn test_limits_serialize_as_min_max() {
        let (_dir, store) = store_with(Some(FOLLOWER_JSON), None);
        let json = serde_json::to_value(store.role_limits()).unwrap();
        assert_eq!(
            json["follower"]["shoulder_pan"],
            serde_json::json!({"min": -105.2, "max": 105.2})
        );
        assert_eq!(json["follower"]["gripper"], serde_json::json!({"min": 0.0, "max": 100.0}));
        assert_eq!(json["leader"], serde_json::json!({}));
    }

    #[test]
    fn test_inverted_range_uses_fallback() {
        let inverted = r#"{
            "shoulder_pan": {"id": 1, "drive_mode": 0, "homing_offset": 0, "range_min": 3337, "range_max": 943},
            "elbow_flex":   {"id": 3, "drive_mode": 0, "homing_offset": 0, "range_min": 890,  "range_max": 3081}
        }"#;
        let (_dir, store) = store_with(Some(inverted), None);
        let limits = store.clamp_limits(ArmRole::Follower);
        assert_eq!(limits.get(JointName::ShoulderPan), Some(JointLimit::FALLBACK_DEGREES));
        assert_eq!(limits.get(JointName::ElbowFlex), Some(JointLimit::new(-96.3, 96.3)));
        assert_eq!(
            limits.get_or_fallback(JointName::ShoulderPan).clamp(200.0),
            (180.0, true)
        );
    }

    #[test]
    fn test_clamp_never_panics_on_inverted_limit() {
        let limit = JointLimit::new(105.2, -105.2);
        let (value, _) = limit.clamp(10.0);
        assert_eq!(value, -105.2);
    }

    #[test]
    fn test_ids_and_ranges() {
        let calibration = Calibration::from_json(FOLLOWER_JSON).unwrap();
        assert_eq!(calibration.ids().into_inner(), [1, 2, 3, 4, 5, 6]);
        let ranges = calibration.raw_ranges();
        assert_eq!(ranges[JointName::ShoulderPan], Some(RawRange::new(943, 3337, false)));
        assert_eq!(Calibration::norm_modes()[JointName::Gripper], NormMode::Range0To100);
    }
}
