//! 原始编码器值与工程单位转换
//!
//! STS3215 为 12 位绝对值编码器（0..=4095）。
//!
//! - 旋转关节：以标定范围中点为零点，单位为度
//! - 夹爪：标定范围映射到 0..=100（百分比）

/// 编码器最大值
pub const MAX_RESOLUTION: f64 = 4095.0;

/// 归一化模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormMode {
    /// 度，标定中点为 0
    Degrees,
    /// 百分比 0..=100
    Range0To100,
}

/// 单个舵机的原始标定范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRange {
    pub min: u16,
    pub max: u16,
    /// `drive_mode == 1` 时方向取反
    pub inverted: bool,
}

impl RawRange {
    pub fn new(min: u16, max: u16, inverted: bool) -> Self {
        Self { min, max, inverted }
    }

    /// 范围中点（零位）
    pub fn mid(&self) -> f64 {
        (self.min as f64 + self.max as f64) / 2.0
    }

    fn span(&self) -> f64 {
        (self.max as f64 - self.min as f64).max(1.0)
    }

    /// 原始值 -> 工程单位
    pub fn to_units(&self, raw: u16, mode: NormMode) -> f64 {
        match mode {
            NormMode::Degrees => {
                let deg = (raw as f64 - self.mid()) * 360.0 / MAX_RESOLUTION;
                if self.inverted { -deg } else { deg }
            },
            NormMode::Range0To100 => {
                let clamped = (raw as f64).clamp(self.min as f64, self.max as f64);
                let pct = (clamped - self.min as f64) / self.span() * 100.0;
                if self.inverted { 100.0 - pct } else { pct }
            },
        }
    }

    /// 工程单位 -> 原始值（结果限制在 0..=4095）
    pub fn to_raw(&self, value: f64, mode: NormMode) -> u16 {
        let raw = match mode {
            NormMode::Degrees => {
                let deg = if self.inverted { -value } else { value };
                deg * MAX_RESOLUTION / 360.0 + self.mid()
            },
            NormMode::Range0To100 => {
                let pct = if self.inverted { 100.0 - value } else { value };
                pct.clamp(0.0, 100.0) / 100.0 * self.span() + self.min as f64
            },
        };
        raw.round().clamp(0.0, MAX_RESOLUTION) as u16
    }
}
