#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 命令行参数 + 标定配置
pub mod dataset; // 数据集整理 (split / merge / data.yaml)
pub mod depth; // 深度图 + 伪彩色
pub mod detection; // 检测结果与后处理
pub mod distance; // 测距策略
pub mod input; // 视频输入系统
pub mod labels; // 类别表
pub mod models; // 模型接口与具体实现
pub mod ort_backend; // ONNX Runtime 推理后端
pub mod pipeline; // 单帧处理流水线
pub mod renderer; // 标注绘制 (+ macroquad 窗口)

pub use crate::config::{Args, DistanceStrategy, PipelineConfig};
pub use crate::depth::DepthMap;
pub use crate::detection::{Detection, DetectionPostprocessor, TensorLayout};
pub use crate::distance::{Distance, DistanceEstimator};
pub use crate::labels::LabelTable;
pub use crate::models::{MiDaS, Model, YOLOv8};
pub use crate::ort_backend::{InferenceBackend, InputLayout, OrtBackend, OrtConfig, OrtEP};
pub use crate::pipeline::{FrameOutput, Pipeline};

/// 按类别分组的贪心 NMS
///
/// 先按置信度降序排列, 只有与已保留的 **同类别** 框 IoU 超过阈值时才会被抑制,
/// 不同类别即使几何完全重合也都保留。
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    if xs.is_empty() {
        return;
    }
    xs.sort_by(|b1, b2| {
        b2.confidence()
            .partial_cmp(&b1.confidence())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].class_id() != xs[index].class_id() {
                continue;
            }
            let iou = xs[prev_index].bbox().iou(xs[index].bbox());
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S",
        delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}

#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct Point2 {
    x: f32,
    y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}

/// 原图像素坐标系下的检测框 (左上角 + 宽高)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bbox {
    xmin: f32,
    ymin: f32,
    width: f32,
    height: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
        }
    }

    /// 中心点形式 (cx, cy, w, h) → 角点形式
    pub fn from_cxcywh(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(cx - width / 2., cy - height / 2., width, height)
    }

    /// 角点形式 → 中心点形式 (cx, cy, w, h)
    pub fn to_cxcywh(&self) -> (f32, f32, f32, f32) {
        let c = self.cxcy();
        (c.x(), c.y(), self.width, self.height)
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn xmin(&self) -> f32 {
        self.xmin
    }

    pub fn ymin(&self) -> f32 {
        self.ymin
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }

    pub fn cxcy(&self) -> Point2 {
        Point2::new(self.xmin + self.width / 2., self.ymin + self.height / 2.)
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.) * self.height.max(0.)
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.xmin.max(another.xmin);
        let r = self.xmax().min(another.xmax());
        let t = self.ymin.max(another.ymin);
        let b = self.ymax().min(another.ymax());
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        let union = self.union(another);
        if union <= 0. {
            return 0.;
        }
        self.intersection_area(another) / union
    }
}
