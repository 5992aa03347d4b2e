// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLO 检测头后处理
// 原始输出 (anchor × (4+nc) 或其转置) → 阈值过滤 → 坐标还原 → 按类别 NMS

use anyhow::{bail, Result};
use ndarray::{s, Array, Array2, ArrayView1, Axis, Ix2, IxDyn};

use crate::{non_max_suppression, Bbox, Detection};

const CXYWH_OFFSET: usize = 4;

/// 归一化坐标判定阈值: 所有保留框的最大坐标 <= 2.0 视为 [0,1] 归一化输出
const NORMALIZED_COORD_LIMIT: f32 = 2.0;

/// 检测头输出张量的布局, 每次推理只判定一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// (num_anchors, 4 + nc)
    AnchorMajor,
    /// (4 + nc, num_anchors), YOLOv8 默认导出格式
    AttributeMajor,
}

impl TensorLayout {
    /// 根据二维形状判定布局
    ///
    /// 已知类别数时, 第 0 维等于 4+nc 即为转置格式 (优先), 第 1 维等于 4+nc 为正常格式;
    /// 类别数未知时, 属性维必须大于 4, 两维都满足时较小的一维视为属性维。
    pub fn resolve(shape: [usize; 2], num_classes: Option<usize>) -> Result<Self> {
        let [d0, d1] = shape;
        match num_classes {
            Some(nc) => {
                let attrs = CXYWH_OFFSET + nc;
                if d0 == attrs {
                    Ok(TensorLayout::AttributeMajor)
                } else if d1 == attrs {
                    Ok(TensorLayout::AnchorMajor)
                } else {
                    bail!(
                        "Detection output shape {:?} does not match 4 + {} classes",
                        shape,
                        nc
                    )
                }
            }
            None => match (d0 > CXYWH_OFFSET, d1 > CXYWH_OFFSET) {
                (false, false) => {
                    bail!("Detection output shape {:?} has no class scores", shape)
                }
                (true, false) => Ok(TensorLayout::AttributeMajor),
                (false, true) => Ok(TensorLayout::AnchorMajor),
                (true, true) if d0 < d1 => Ok(TensorLayout::AttributeMajor),
                (true, true) => Ok(TensorLayout::AnchorMajor),
            },
        }
    }
}

/// 坐标空间, 同样每次推理只判定一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSpace {
    /// [0, 1] 归一化坐标, 乘以原图尺寸
    Normalized,
    /// 模型输入像素坐标, 乘以 原图/输入 比例
    InputPixels,
}

impl CoordinateSpace {
    pub fn detect(max_coord: f32) -> Self {
        if max_coord <= NORMALIZED_COORD_LIMIT {
            CoordinateSpace::Normalized
        } else {
            CoordinateSpace::InputPixels
        }
    }

    /// 返回 (sx, sy) 缩放系数
    pub fn scale(
        &self,
        input_size: (u32, u32),
        frame_size: (u32, u32),
    ) -> (f32, f32) {
        let (w1, h1) = (frame_size.0 as f32, frame_size.1 as f32);
        match self {
            CoordinateSpace::Normalized => (w1, h1),
            CoordinateSpace::InputPixels => {
                let (w0, h0) = (input_size.0.max(1) as f32, input_size.1.max(1) as f32);
                (w1 / w0, h1 / h0)
            }
        }
    }
}

/// 布局已归一为 (anchor, attribute) 的原始检测输出
#[derive(Debug, Clone)]
pub struct RawDetections {
    preds: Array2<f32>,
    layout: TensorLayout,
}

impl RawDetections {
    /// 去掉前导的 batch=1 维度并判定布局
    pub fn new(xs: Array<f32, IxDyn>, num_classes: Option<usize>) -> Result<Self> {
        let mut xs = xs;
        while xs.ndim() > 2 {
            if xs.shape()[0] != 1 {
                bail!(
                    "Only batch=1 detection output is supported, got shape {:?}",
                    xs.shape()
                );
            }
            xs = xs.index_axis_move(Axis(0), 0);
        }
        let xs = xs.into_dimensionality::<Ix2>()?;
        let (d0, d1) = xs.dim();
        let layout = TensorLayout::resolve([d0, d1], num_classes)?;
        let preds = match layout {
            TensorLayout::AnchorMajor => xs,
            TensorLayout::AttributeMajor => xs.reversed_axes(),
        };
        Ok(Self { preds, layout })
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    pub fn num_classes(&self) -> usize {
        self.preds.ncols() - CXYWH_OFFSET
    }

    /// 逐 anchor 迭代, 每行为 [cx, cy, w, h, score_0, .., score_nc-1]
    pub fn anchors(&self) -> impl Iterator<Item = ArrayView1<'_, f32>> {
        self.preds.axis_iter(Axis(0))
    }
}

/// 阈值过滤后的候选框 (仍在模型坐标空间)
#[derive(Debug, Clone, Copy)]
struct Candidate {
    class_id: usize,
    confidence: f32,
    cxcywh: [f32; 4],
}

/// YOLO 检测后处理器
#[derive(Debug, Clone)]
pub struct DetectionPostprocessor {
    conf: f32,
    iou: f32,
    input_size: (u32, u32), // (width, height)
    num_classes: Option<usize>,
}

impl DetectionPostprocessor {
    pub fn new(conf: f32, iou: f32, input_size: (u32, u32)) -> Self {
        Self {
            conf,
            iou,
            input_size,
            num_classes: None,
        }
    }

    pub fn with_num_classes(mut self, nc: usize) -> Self {
        self.num_classes = Some(nc);
        self
    }

    pub fn conf(&self) -> f32 {
        self.conf
    }

    pub fn iou(&self) -> f32 {
        self.iou
    }

    /// 固定的类别数 (来自 --nc 或模型元数据)
    pub fn num_classes(&self) -> Option<usize> {
        self.num_classes
    }

    pub fn postprocess(
        &self,
        xs: Array<f32, IxDyn>,
        frame_size: (u32, u32),
    ) -> Result<Vec<Detection>> {
        let raw = RawDetections::new(xs, self.num_classes)?;
        Ok(self.decode(&raw, frame_size))
    }

    /// 对已判定布局的输出做阈值过滤 + 坐标还原 + NMS, 类别数以 `raw` 为准
    pub fn decode(&self, raw: &RawDetections, frame_size: (u32, u32)) -> Vec<Detection> {
        let candidates = self.threshold(raw);
        if candidates.is_empty() {
            return Vec::new();
        }

        let max_coord = candidates
            .iter()
            .flat_map(|c| c.cxcywh)
            .fold(f32::MIN, f32::max);
        let space = CoordinateSpace::detect(max_coord);
        let (sx, sy) = space.scale(self.input_size, frame_size);
        log::trace!(
            "{} candidates, {:?} layout, {:?} coords",
            candidates.len(),
            raw.layout(),
            space
        );

        let mut ys: Vec<Detection> = candidates
            .into_iter()
            .map(|c| {
                let [cx, cy, w, h] = c.cxcywh;
                Detection::new(
                    c.class_id,
                    c.confidence,
                    Bbox::from_cxcywh(cx * sx, cy * sy, w * sx, h * sy),
                )
            })
            .collect();

        non_max_suppression(&mut ys, self.iou);
        ys
    }

    fn threshold(&self, raw: &RawDetections) -> Vec<Candidate> {
        let nc = raw.num_classes();
        let mut ys = Vec::new();
        for pred in raw.anchors() {
            let bbox = pred.slice(s![0..CXYWH_OFFSET]);
            let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + nc]);

            let (class_id, confidence) = clss.iter().enumerate().fold(
                (0usize, f32::MIN),
                |max, (i, &x)| if x > max.1 { (i, x) } else { max },
            );

            if confidence <= self.conf {
                continue;
            }

            ys.push(Candidate {
                class_id,
                confidence,
                cxcywh: [bbox[0], bbox[1], bbox[2], bbox[3]],
            });
        }
        ys
    }
}
