/// 单帧处理流水线 (Frame Pipeline)
///
/// 帧 → YOLOv8 检测 → (可选) MiDaS 深度 → 测距 → 绘制
///
/// 全部阶段在调用线程内同步执行, 每帧处理完才读取下一帧, 帧与帧之间不保留状态。
use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::detection::AnnotatedDetection;
use crate::distance::build_estimator;
use crate::input::{Frame, FrameSource};
use crate::models::{MiDaS, Model, YOLOv8};
use crate::renderer::{side_by_side, Renderer, Style};
use crate::{Args, DepthMap, DistanceEstimator, PipelineConfig};

/// 单帧处理结果
pub struct FrameOutput {
    pub detections: Vec<AnnotatedDetection>,
    /// 标注后的彩色画面
    pub annotated: RgbImage,
    /// 标注后的深度伪彩色画面 (加载了深度模型时)
    pub depth_view: Option<RgbImage>,
}

impl FrameOutput {
    /// 彩色画面与深度画面左右拼接; 无深度画面时返回彩色画面
    pub fn composite(&self) -> RgbImage {
        match &self.depth_view {
            Some(depth) => side_by_side(&self.annotated, depth),
            None => self.annotated.clone(),
        }
    }
}

/// 处理结果的去向 (窗口 / 图片目录)
pub trait FrameSink {
    fn consume(&mut self, frame: &Frame, output: &FrameOutput) -> Result<()>;

    /// 每帧检查一次的退出信号
    fn should_stop(&self) -> bool {
        false
    }
}

/// 把标注结果按帧序号保存为 PNG
pub struct ImageDirSink {
    dir: PathBuf,
    saved: usize,
}

impl ImageDirSink {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output dir {}", dir.display()))?;
        log::info!("💾 标注结果保存到: {}", dir.display());
        Ok(Self { dir, saved: 0 })
    }

    pub fn frame_path(&self, frame_id: u64) -> PathBuf {
        self.dir.join(format!("{:06}.png", frame_id))
    }

    pub fn saved(&self) -> usize {
        self.saved
    }
}

impl FrameSink for ImageDirSink {
    fn consume(&mut self, frame: &Frame, output: &FrameOutput) -> Result<()> {
        let path = self.frame_path(frame.id);
        output
            .composite()
            .save(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        self.saved += 1;
        Ok(())
    }
}

pub struct Pipeline {
    detector: YOLOv8,
    depth: Option<MiDaS>,
    estimator: Box<dyn DistanceEstimator>,
    renderer: Renderer,
}

impl Pipeline {
    /// 加载模型并构建流水线; 模型缺失或策略需要深度但未提供深度模型时失败
    pub fn new(args: &Args, config: &PipelineConfig) -> Result<Self> {
        if args.strategy.needs_depth() && args.depth_model.is_none() {
            bail!(
                "Distance strategy {:?} requires --depth-model",
                args.strategy
            );
        }

        let detector = YOLOv8::new(args, config)?;
        detector.summary();

        let depth = match &args.depth_model {
            Some(path) => {
                let model = MiDaS::new(path, args)?;
                model.summary();
                Some(model)
            }
            None => None,
        };

        let estimator = build_estimator(args.strategy, config);
        log::info!("📏 测距策略: {}", estimator.name());

        let font = args.font.as_deref().or(config.font_path.as_deref());
        let renderer = Renderer::new(font);

        Self::with_parts(detector, depth, estimator, renderer)
    }

    /// 使用已构建的组件
    pub fn with_parts(
        detector: YOLOv8,
        depth: Option<MiDaS>,
        estimator: Box<dyn DistanceEstimator>,
        renderer: Renderer,
    ) -> Result<Self> {
        if estimator.needs_depth() && depth.is_none() {
            bail!("Estimator {} needs a depth model", estimator.name());
        }
        Ok(Self {
            detector,
            depth,
            estimator,
            renderer,
        })
    }

    /// 处理一帧
    pub fn process(&mut self, frame: &Frame) -> Result<FrameOutput> {
        let detections = self.detector.forward(&frame.image)?;
        let depth: Option<DepthMap> = match self.depth.as_mut() {
            Some(model) => Some(model.forward(&frame.image)?),
            None => None,
        };

        let names = self.detector.names();
        let annotated: Vec<AnnotatedDetection> = detections
            .into_iter()
            .map(|detection| {
                let label = names.name(detection.class_id()).to_string();
                let distance = self.estimator.estimate(&detection, &label, depth.as_ref());
                AnnotatedDetection {
                    detection,
                    label,
                    distance,
                }
            })
            .collect();

        for d in &annotated {
            let b = d.detection.bbox();
            log::debug!(
                "[frame {}] {} {:.2} box=({:.0}, {:.0}, {:.0}, {:.0}) {}",
                frame.id,
                d.label,
                d.detection.confidence(),
                b.xmin(),
                b.ymin(),
                b.width(),
                b.height(),
                d.distance
            );
        }

        let mut color = frame.image.clone();
        self.renderer
            .draw(&mut color, &annotated, &Style::color_view());

        let depth_view = depth.map(|map| {
            let mut view = map.colorize();
            self.renderer
                .draw(&mut view, &annotated, &Style::depth_view());
            view
        });

        Ok(FrameOutput {
            detections: annotated,
            annotated: color,
            depth_view,
        })
    }

    /// 同步主循环: 读帧 → 处理 → 输出, 直到流结束、退出信号或帧数上限
    ///
    /// 读帧或处理失败会直接结束循环并返回错误, 不做重试。
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        max_frames: Option<usize>,
    ) -> Result<usize> {
        let mut processed = 0usize;
        let started = Instant::now();

        loop {
            if sink.should_stop() {
                log::info!("🛑 收到退出信号");
                break;
            }
            if max_frames.is_some_and(|max| processed >= max) {
                break;
            }

            let Some(frame) = source.next_frame()? else {
                log::info!("📭 输入结束");
                break;
            };
            let output = self.process(&frame)?;
            sink.consume(&frame, &output)?;
            processed += 1;
        }

        let secs = started.elapsed().as_secs_f64();
        if processed > 0 && secs > 0.0 {
            log::info!(
                "✅ 共处理 {} 帧, 平均 {:.1}fps",
                processed,
                processed as f64 / secs
            );
        }
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{BoxHeightEstimator, DepthMapEstimator};
    use crate::models::yolov8::tests::{detector, detector_with_names, single_person_output};
    use crate::ort_backend::{InferenceBackend, InputLayout, InputSpec};
    use crate::labels::UNKNOWN_LABEL;
    use crate::{Distance, LabelTable};
    use ndarray::{Array, Array3, IxDyn};

    /// 输出常数深度图的假后端
    struct ConstDepthBackend(f32);

    impl InferenceBackend for ConstDepthBackend {
        fn input_spec(&self) -> InputSpec {
            InputSpec {
                width: 256,
                height: 256,
                layout: InputLayout::Nchw,
            }
        }

        fn run(&mut self, _xs: Array<f32, IxDyn>, _profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
            Ok(vec![Array::from_elem(IxDyn(&[1, 256, 256]), self.0)])
        }
    }

    /// 输出固定目标的 (1, 84, 1) 检测结果, 框为 (100, 50, 40, 80)
    fn boxed_object_output() -> Array<f32, IxDyn> {
        let mut out = Array3::<f32>::zeros((1, 84, 1));
        out[[0, 0, 0]] = 120.;
        out[[0, 1, 0]] = 90.;
        out[[0, 2, 0]] = 40.;
        out[[0, 3, 0]] = 80.;
        out[[0, 6, 0]] = 0.8;
        out.into_dyn()
    }

    fn frame(w: u32, h: u32) -> Frame {
        Frame {
            id: 0,
            image: RgbImage::new(w, h),
        }
    }

    struct CollectSink {
        outputs: Vec<usize>,
        stop_after: Option<usize>,
    }

    impl FrameSink for CollectSink {
        fn consume(&mut self, _frame: &Frame, output: &FrameOutput) -> Result<()> {
            self.outputs.push(output.detections.len());
            Ok(())
        }

        fn should_stop(&self) -> bool {
            self.stop_after.is_some_and(|n| self.outputs.len() >= n)
        }
    }

    struct RepeatSource {
        left: usize,
        next_id: u64,
    }

    impl FrameSource for RepeatSource {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.left == 0 {
                return Ok(None);
            }
            self.left -= 1;
            let id = self.next_id;
            self.next_id += 1;
            Ok(Some(Frame {
                id,
                image: RgbImage::new(640, 640),
            }))
        }
    }

    #[test]
    fn test_depth_inverse_end_to_end() {
        let depth = MiDaS::with_engine(Box::new(ConstDepthBackend(10.0)));
        let mut pipeline = Pipeline::with_parts(
            detector(boxed_object_output()),
            Some(depth),
            Box::new(DepthMapEstimator::inverse(1000.0)),
            Renderer::with_font(None),
        )
        .unwrap();

        let out = pipeline.process(&frame(640, 640)).unwrap();
        assert_eq!(out.detections.len(), 1);
        let d = &out.detections[0];
        assert_eq!(d.label, "car");
        let b = d.detection.bbox();
        assert!((b.xmin() - 100.).abs() < 1e-3);
        assert!((b.ymin() - 50.).abs() < 1e-3);
        match d.distance {
            Distance::Scaled(v) => assert!((v - 100.0).abs() < 1e-3),
            ref other => panic!("unexpected distance {:?}", other),
        }

        let view = out.depth_view.as_ref().unwrap();
        assert_eq!(view.dimensions(), (640, 640));
        assert_eq!(out.composite().dimensions(), (1280, 640));
    }

    #[test]
    fn test_box_height_without_depth() {
        let config = PipelineConfig::default();
        let mut pipeline = Pipeline::with_parts(
            detector(single_person_output()),
            None,
            Box::new(BoxHeightEstimator::new(&config)),
            Renderer::with_font(None),
        )
        .unwrap();

        let out = pipeline.process(&frame(640, 640)).unwrap();
        assert_eq!(out.detections.len(), 1);
        assert_eq!(out.detections[0].label, "person");
        assert!(matches!(out.detections[0].distance, Distance::Meters(_)));
        assert!(out.depth_view.is_none());
        assert_eq!(out.composite().dimensions(), (640, 640));
    }

    #[test]
    fn test_mismatched_vocabulary_falls_back_to_unknown() {
        // COCO 输出中的 chair (56) 超出 12 类词表
        let mut out = Array3::<f32>::zeros((1, 84, 2));
        out[[0, 0, 0]] = 200.;
        out[[0, 1, 0]] = 200.;
        out[[0, 2, 0]] = 50.;
        out[[0, 3, 0]] = 100.;
        out[[0, 4 + 56, 0]] = 0.85;
        out[[0, 0, 1]] = 500.;
        out[[0, 1, 1]] = 400.;
        out[[0, 2, 1]] = 40.;
        out[[0, 3, 1]] = 80.;
        out[[0, 4 + 7, 1]] = 0.75;

        let config = PipelineConfig::default();
        let mut pipeline = Pipeline::with_parts(
            detector_with_names(out.into_dyn(), LabelTable::dataset()),
            None,
            Box::new(BoxHeightEstimator::new(&config)),
            Renderer::with_font(None),
        )
        .unwrap();

        let out = pipeline.process(&frame(640, 640)).unwrap();
        let mut labels: Vec<&str> = out.detections.iter().map(|d| d.label.as_str()).collect();
        labels.sort();
        assert_eq!(labels, vec!["Person", UNKNOWN_LABEL]);
    }

    #[test]
    fn test_depth_estimator_requires_depth_model() {
        let result = Pipeline::with_parts(
            detector(single_person_output()),
            None,
            Box::new(DepthMapEstimator::relative()),
            Renderer::with_font(None),
        );
        assert!(result.is_err());

        let args = <Args as clap::Parser>::parse_from([
            "live",
            "--model",
            "yolov8n.onnx",
            "--strategy",
            "depth-inverse",
        ]);
        assert!(Pipeline::new(&args, &PipelineConfig::default()).is_err());
    }

    #[test]
    fn test_run_stops_on_budget_signal_and_end_of_stream() {
        let config = PipelineConfig::default();
        let mut pipeline = Pipeline::with_parts(
            detector(single_person_output()),
            None,
            Box::new(BoxHeightEstimator::new(&config)),
            Renderer::with_font(None),
        )
        .unwrap();

        let mut sink = CollectSink {
            outputs: vec![],
            stop_after: None,
        };
        let mut source = RepeatSource { left: 3, next_id: 0 };
        assert_eq!(pipeline.run(&mut source, &mut sink, None).unwrap(), 3);

        let mut source = RepeatSource { left: 10, next_id: 0 };
        assert_eq!(pipeline.run(&mut source, &mut sink, Some(2)).unwrap(), 2);

        let mut sink = CollectSink {
            outputs: vec![],
            stop_after: Some(1),
        };
        let mut source = RepeatSource { left: 10, next_id: 0 };
        assert_eq!(pipeline.run(&mut source, &mut sink, None).unwrap(), 1);
    }

    #[test]
    fn test_image_dir_sink_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageDirSink::new(dir.path().join("out")).unwrap();
        let f = Frame {
            id: 7,
            image: RgbImage::new(4, 4),
        };
        let out = FrameOutput {
            detections: vec![],
            annotated: f.image.clone(),
            depth_view: None,
        };
        sink.consume(&f, &out).unwrap();
        assert!(sink.frame_path(7).exists());
        assert_eq!(sink.saved(), 1);
    }
}
