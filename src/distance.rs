//! 测距策略
//!
//! 两种互斥的实现, 运行前按配置选定:
//! - [`BoxHeightEstimator`]: 已知物体高度 × 焦距 ÷ 框高
//! - [`DepthMapEstimator`]:  在框中心采样深度图, 反比例换算或直接输出相对深度
//!
//! 两者都未经物理标定, 只保证 "越近信号越大/距离越小" 的单调性。

use std::collections::BTreeMap;
use std::fmt;

use crate::config::{DistanceStrategy, PipelineConfig};
use crate::{DepthMap, Detection};

/// 针孔模型测距: known_height × focal ÷ apparent_height
///
/// apparent_height <= 0 时返回 0, 单位与 known_height 相同。
pub fn estimate_distance(known_height: f32, apparent_height_px: f32, focal_length_px: f32) -> f32 {
    if apparent_height_px <= 0. {
        return 0.;
    }
    known_height * focal_length_px / apparent_height_px
}

/// 附加在检测结果上的距离值
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distance {
    /// 框高测距 (米)
    Meters(f32),
    /// 深度反比例换算后的伪距离 (无单位)
    Scaled(f32),
    /// 归一化相对深度 0-255, 越大越近
    Relative(u8),
    /// 需要深度图但本帧没有
    Unavailable,
}

impl Distance {
    pub fn value(&self) -> Option<f32> {
        match *self {
            Distance::Meters(v) | Distance::Scaled(v) => Some(v),
            Distance::Relative(v) => Some(v as f32),
            Distance::Unavailable => None,
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Meters(m) => write!(f, "Dist: {:.2}m", m),
            Distance::Scaled(v) => write!(f, "Dist: {:.2}", v),
            Distance::Relative(v) => write!(f, "Rel Dist: {}", v),
            Distance::Unavailable => write!(f, "Dist: --"),
        }
    }
}

/// 测距策略接口
pub trait DistanceEstimator {
    fn name(&self) -> &'static str;

    /// 是否需要每帧的深度图
    fn needs_depth(&self) -> bool;

    fn estimate(&self, detection: &Detection, label: &str, depth: Option<&DepthMap>) -> Distance;
}

/// 已知高度测距
#[derive(Debug, Clone)]
pub struct BoxHeightEstimator {
    focal_length_px: f32,
    default_height_cm: f32,
    known_heights_cm: BTreeMap<String, f32>,
}

impl BoxHeightEstimator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            focal_length_px: config.focal_length_px,
            default_height_cm: config.default_height_cm,
            known_heights_cm: config
                .known_heights_cm
                .iter()
                .map(|(label, cm)| (label.to_lowercase(), *cm))
                .collect(),
        }
    }

    /// 按类别名查已知高度, 不区分大小写
    pub fn known_height_cm(&self, label: &str) -> f32 {
        self.known_heights_cm
            .get(&label.to_lowercase())
            .copied()
            .unwrap_or(self.default_height_cm)
    }
}

impl DistanceEstimator for BoxHeightEstimator {
    fn name(&self) -> &'static str {
        "box-height"
    }

    fn needs_depth(&self) -> bool {
        false
    }

    fn estimate(&self, detection: &Detection, label: &str, _depth: Option<&DepthMap>) -> Distance {
        let known_cm = self.known_height_cm(label);
        let cm = estimate_distance(known_cm, detection.bbox().height(), self.focal_length_px);
        Distance::Meters(cm / 100.)
    }
}

/// 深度图采样方式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DepthReadout {
    /// calibration ÷ depth, depth <= 0 时为 0
    Inverse { calibration: f32 },
    /// 归一化相对深度, 不做换算
    Relative,
}

/// 深度图测距
#[derive(Debug, Clone)]
pub struct DepthMapEstimator {
    readout: DepthReadout,
}

impl DepthMapEstimator {
    pub fn new(readout: DepthReadout) -> Self {
        Self { readout }
    }

    pub fn inverse(calibration: f32) -> Self {
        Self::new(DepthReadout::Inverse { calibration })
    }

    pub fn relative() -> Self {
        Self::new(DepthReadout::Relative)
    }
}

impl DistanceEstimator for DepthMapEstimator {
    fn name(&self) -> &'static str {
        match self.readout {
            DepthReadout::Inverse { .. } => "depth-inverse",
            DepthReadout::Relative => "depth-relative",
        }
    }

    fn needs_depth(&self) -> bool {
        true
    }

    fn estimate(&self, detection: &Detection, _label: &str, depth: Option<&DepthMap>) -> Distance {
        let Some(depth) = depth else {
            return Distance::Unavailable;
        };
        let (cx, cy) = detection.center_pixel(depth.width(), depth.height());
        let value = depth.sample(cx as i64, cy as i64);
        match self.readout {
            DepthReadout::Inverse { calibration } => {
                if value <= 0. || !value.is_finite() {
                    Distance::Scaled(0.)
                } else {
                    Distance::Scaled(calibration / value)
                }
            }
            DepthReadout::Relative => Distance::Relative(depth.normalize_value(value)),
        }
    }
}

/// 按配置构建测距策略
pub fn build_estimator(
    strategy: DistanceStrategy,
    config: &PipelineConfig,
) -> Box<dyn DistanceEstimator> {
    match strategy {
        DistanceStrategy::BoxHeight => Box::new(BoxHeightEstimator::new(config)),
        DistanceStrategy::DepthInverse => {
            Box::new(DepthMapEstimator::inverse(config.depth_calibration))
        }
        DistanceStrategy::DepthRelative => Box::new(DepthMapEstimator::relative()),
    }
}
