/// 检测结果数据结构
/// Data structures for per-frame detections
use crate::{Bbox, Distance};

/// 单个检测目标 (生命周期 = 一帧)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    class_id: usize,
    confidence: f32,
    bbox: Bbox, // 原图像素坐标
}

impl Detection {
    pub fn new(class_id: usize, confidence: f32, bbox: Bbox) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
        }
    }

    pub fn class_id(&self) -> usize {
        self.class_id
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> &Bbox {
        &self.bbox
    }

    /// 框中心的整数像素坐标, 限制在 (width, height) 画面内
    pub fn center_pixel(&self, width: u32, height: u32) -> (u32, u32) {
        let c = self.bbox.cxcy();
        let x = (c.x() as i64).clamp(0, width.saturating_sub(1) as i64);
        let y = (c.y() as i64).clamp(0, height.saturating_sub(1) as i64);
        (x as u32, y as u32)
    }
}

/// 带类别名与距离的检测结果 (渲染输入)
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedDetection {
    pub detection: Detection,
    pub label: String,
    pub distance: Distance,
}

impl AnnotatedDetection {
    /// "person 0.87 | Dist: 1.21m"
    pub fn caption(&self) -> String {
        format!(
            "{} {:.2} | {}",
            self.label,
            self.detection.confidence(),
            self.distance
        )
    }
}
