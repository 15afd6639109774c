//! 关节命名与定长关节数组
//!
//! SO-101 机械臂固定有 5 个旋转关节 + 1 个夹爪。关节集合是封闭的，
//! 因此用枚举 + 定长数组表达，"所有关节都存在"在编译期即成立，
//! 不需要运行时检查 map 中是否缺键。

use crate::ProtocolError;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// 关节数量
pub const JOINT_COUNT: usize = 6;

/// 关节名称（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum JointName {
    ShoulderPan,
    ShoulderLift,
    ElbowFlex,
    WristFlex,
    WristRoll,
    Gripper,
}

impl JointName {
    /// 按总线顺序排列的全部关节
    pub const ALL: [JointName; JOINT_COUNT] = [
        JointName::ShoulderPan,
        JointName::ShoulderLift,
        JointName::ElbowFlex,
        JointName::WristFlex,
        JointName::WristRoll,
        JointName::Gripper,
    ];

    /// 数组下标
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 默认舵机总线地址（1..=6）
    pub const fn default_id(self) -> u8 {
        self as u8 + 1
    }

    /// 是否为夹爪（百分比单位，其余关节为角度）
    pub const fn is_gripper(self) -> bool {
        matches!(self, JointName::Gripper)
    }

    /// 标定文件 / JSON 中使用的名称
    pub const fn as_str(self) -> &'static str {
        match self {
            JointName::ShoulderPan => "shoulder_pan",
            JointName::ShoulderLift => "shoulder_lift",
            JointName::ElbowFlex => "elbow_flex",
            JointName::WristFlex => "wrist_flex",
            JointName::WristRoll => "wrist_roll",
            JointName::Gripper => "gripper",
        }
    }
}

impl fmt::Display for JointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JointName {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JointName::ALL
            .into_iter()
            .find(|joint| joint.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownJoint(s.to_string()))
    }
}

/// 机械臂角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ArmRole {
    /// 主臂（操作员手动拖动）
    Leader,
    /// 从臂（电机驱动）
    Follower,
}

impl ArmRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            ArmRole::Leader => "leader",
            ArmRole::Follower => "follower",
        }
    }
}

impl fmt::Display for ArmRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 按关节索引的定长数组
///
/// 用于关节快照、同步读写负载以及目标位置表。
/// 序列化为以关节名为键的 JSON 对象。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointArray<T>([T; JOINT_COUNT]);

impl<T> JointArray<T> {
    pub const fn new(values: [T; JOINT_COUNT]) -> Self {
        Self(values)
    }

    /// 逐关节构造
    pub fn from_fn(mut f: impl FnMut(JointName) -> T) -> Self {
        Self(std::array::from_fn(|i| f(JointName::ALL[i])))
    }

    /// 逐关节映射
    pub fn map<U>(&self, mut f: impl FnMut(JointName, &T) -> U) -> JointArray<U> {
        JointArray::from_fn(|joint| f(joint, &self[joint]))
    }

    /// 按总线顺序迭代 `(关节, 值)`
    pub fn iter(&self) -> impl Iterator<Item = (JointName, &T)> {
        JointName::ALL.into_iter().zip(self.0.iter())
    }

    pub fn values(&self) -> &[T; JOINT_COUNT] {
        &self.0
    }

    pub fn into_inner(self) -> [T; JOINT_COUNT] {
        self.0
    }
}

impl<T: Clone> JointArray<T> {
    /// 所有关节填充同一个值
    pub fn splat(value: T) -> Self {
        Self(std::array::from_fn(|_| value.clone()))
    }
}

impl<T> JointArray<Option<T>> {
    /// 仅当所有关节都有值时返回完整数组
    pub fn transpose(self) -> Option<JointArray<T>> {
        let [a, b, c, d, e, f] = self.0;
        Some(JointArray([a?, b?, c?, d?, e?, f?]))
    }

    /// 缺失值的关节
    pub fn missing(&self) -> Vec<JointName> {
        self.iter().filter(|(_, value)| value.is_none()).map(|(joint, _)| joint).collect()
    }
}

impl<T> Index<JointName> for JointArray<T> {
    type Output = T;

    fn index(&self, joint: JointName) -> &T {
        &self.0[joint.index()]
    }
}

impl<T> IndexMut<JointName> for JointArray<T> {
    fn index_mut(&mut self, joint: JointName) -> &mut T {
        &mut self.0[joint.index()]
    }
}

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for JointArray<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(JOINT_COUNT))?;
        for (joint, value) in self.iter() {
            map.serialize_entry(joint.as_str(), value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_name_parse() {
        assert_eq!("elbow_flex".parse::<JointName>().unwrap(), JointName::ElbowFlex);
        assert_eq!("gripper".parse::<JointName>().unwrap(), JointName::Gripper);
        assert!(matches!(
            "elbow".parse::<JointName>(),
            Err(ProtocolError::UnknownJoint(name)) if name == "elbow"
        ));
    }

    #[test]
    fn test_default_ids_follow_bus_order() {
        let ids: Vec<u8> = JointName::ALL.iter().map(|j| j.default_id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
        assert!(JointName::Gripper.is_gripper());
        assert!(!JointName::WristRoll.is_gripper());
    }

    #[test]
    fn test_joint_array_index_and_map() {
        let mut positions = JointArray::splat(0.0_f64);
        positions[JointName::WristFlex] = 15.0;

        let doubled = positions.map(|_, v| v * 2.0);
        assert_eq!(doubled[JointName::WristFlex], 30.0);
        assert_eq!(doubled[JointName::ShoulderPan], 0.0);
    }

    #[test]
    fn test_transpose_requires_every_joint() {
        let mut partial = JointArray::splat(Some(1.0_f64));
        assert!(partial.transpose().is_some());

        partial[JointName::ElbowFlex] = None;
        assert_eq!(partial.missing(), vec![JointName::ElbowFlex]);
        assert!(partial.transpose().is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_joint_array_serializes_as_named_map() {
        let values = JointArray::from_fn(|joint| joint.default_id());
        let json = serde_json::to_value(values).unwrap();
        assert_eq!(json["shoulder_pan"], 1);
        assert_eq!(json["gripper"], 6);
        assert_eq!(json.as_object().unwrap().len(), JOINT_COUNT);
    }
}
