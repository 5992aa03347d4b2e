// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 检测模型
// 包含: 模型加载、预处理、推理、后处理

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::{Array, IxDyn};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{to_input_tensor, Model};
use crate::ort_backend::{InferenceBackend, InputSpec, OrtBackend, OrtConfig};
use crate::detection::RawDetections;
use crate::{Args, Detection, DetectionPostprocessor, LabelTable, PipelineConfig};

/// 检测模型默认输入边长
pub const DETECT_SIZE: u32 = 640;

/// YOLOv8 检测模型
pub struct YOLOv8 {
    engine: Box<dyn InferenceBackend>,
    spec: InputSpec,
    postprocessor: DetectionPostprocessor,
    names: LabelTable,
    profile: bool,
    // 输出类别数与词表长度不一致时只提示一次
    mismatch_warned: AtomicBool,
}

impl YOLOv8 {
    /// 从命令行参数与标定配置创建, 模型文件缺失直接报错
    pub fn new(args: &Args, config: &PipelineConfig) -> Result<Self> {
        let ort_args = OrtConfig::new(args.model.clone(), DETECT_SIZE)
            .with_args(args)
            .with_image_size(args.height, args.width);
        let engine = OrtBackend::build(ort_args)
            .with_context(|| format!("Failed to build detector from {}", args.model))?;

        // 类别名: 模型元数据优先, 其次配置的词表
        let metadata_names = engine.names();
        let metadata_nc = metadata_names.as_ref().map(Vec::len);
        let names = metadata_names
            .map(LabelTable::new)
            .unwrap_or_else(|| LabelTable::from_vocabulary(config.vocabulary));

        let mut model = Self::with_engine(
            Box::new(engine),
            names,
            config.conf_threshold,
            config.iou_threshold,
        );
        // 类别数只由 --nc 或模型元数据固定, 否则从输出形状推断
        if let Some(nc) = args.nc.or(metadata_nc) {
            model = model.with_num_classes(nc);
        }
        model.profile = args.profile;
        Ok(model)
    }

    /// 使用已构建的推理后端; 词表只用于显示, 不限定输出类别数
    pub fn with_engine(
        engine: Box<dyn InferenceBackend>,
        names: LabelTable,
        conf: f32,
        iou: f32,
    ) -> Self {
        let spec = engine.input_spec();
        let postprocessor = DetectionPostprocessor::new(conf, iou, (spec.width, spec.height));
        Self {
            engine,
            spec,
            postprocessor,
            names,
            profile: false,
            mismatch_warned: AtomicBool::new(false),
        }
    }

    /// 固定输出类别数
    pub fn with_num_classes(mut self, nc: usize) -> Self {
        self.postprocessor = self.postprocessor.with_num_classes(nc);
        self
    }

    pub fn names(&self) -> &LabelTable {
        &self.names
    }

    pub fn conf(&self) -> f32 {
        self.postprocessor.conf()
    }

    pub fn iou(&self) -> f32 {
        self.postprocessor.iou()
    }
}

impl Model for YOLOv8 {
    type Output = Vec<Detection>;

    /// 直接拉伸到输入尺寸, /255 归一化
    fn preprocess(&mut self, image: &RgbImage) -> Result<Array<f32, IxDyn>> {
        to_input_tensor(image, &self.spec, |_, v| v as f32 / 255.0)
    }

    fn postprocess(&self, xs: Vec<Array<f32, IxDyn>>, image: &RgbImage) -> Result<Vec<Detection>> {
        let preds = xs
            .into_iter()
            .next()
            .context("Detector returned no outputs")?;
        let raw = RawDetections::new(preds, self.postprocessor.num_classes())?;

        if raw.num_classes() != self.names.len()
            && !self.mismatch_warned.swap(true, Ordering::Relaxed)
        {
            log::warn!(
                "⚠️ 模型输出 {} 类, 词表有 {} 类, 超出词表的类别显示为 Unknown",
                raw.num_classes(),
                self.names.len()
            );
        }
        Ok(self.postprocessor.decode(&raw, image.dimensions()))
    }

    fn name(&self) -> &'static str {
        "YOLOv8"
    }

    fn profile(&self) -> bool {
        self.profile
    }

    fn engine_mut(&mut self) -> &mut dyn InferenceBackend {
        self.engine.as_mut()
    }

    fn summary(&self) {
        log::info!(
            "🎯 YOLOv8 | {} | names: {}, conf: {}, iou: {}",
            self.engine.summary(),
            self.names.len(),
            self.conf(),
            self.iou(),
        );
    }
}
