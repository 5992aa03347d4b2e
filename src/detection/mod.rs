/// 检测系统 (Detection System)
///
/// - types:       单帧检测结果
/// - postprocess: 原始输出张量 → 阈值过滤 → 坐标还原 → 按类别 NMS
pub mod postprocess;
pub mod types;

pub use postprocess::{CoordinateSpace, DetectionPostprocessor, RawDetections, TensorLayout};
pub use types::{AnnotatedDetection, Detection};
