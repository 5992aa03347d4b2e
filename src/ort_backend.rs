// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理后端

use anyhow::{bail, Context, Result};
use ndarray::{Array, IxDyn};
use once_cell::sync::Lazy;
use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use regex::Regex;
use std::path::Path;

/// Ultralytics 导出的 names 元数据: {0: 'person', 1: 'bicycle', ...}
static NAMES_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(\d+)\s*:\s*['"]([^'"]*)['"]"#).ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

/// 模型输入张量的通道排布
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// [1, 3, H, W]
    Nchw,
    /// [1, H, W, 3]
    Nhwc,
}

impl InputLayout {
    /// 从输入形状判定, 通道维为 3 的一侧胜出; 无法判定时返回 None
    pub fn from_shape(dims: &[i64]) -> Option<Self> {
        if dims.len() != 4 {
            return None;
        }
        if dims[1] == 3 {
            Some(InputLayout::Nchw)
        } else if dims[3] == 3 {
            Some(InputLayout::Nhwc)
        } else {
            None
        }
    }
}

/// 模型输入约定: 尺寸 + 排布
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSpec {
    pub width: u32,
    pub height: u32,
    pub layout: InputLayout,
}

impl InputSpec {
    /// 单张图片 (batch=1) 的输入张量形状
    pub fn shape(&self) -> [usize; 4] {
        let (h, w) = (self.height as usize, self.width as usize);
        match self.layout {
            InputLayout::Nchw => [1, 3, h, w],
            InputLayout::Nhwc => [1, h, w, 3],
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: String,
    pub ep: OrtEP,
    pub trt_fp16: bool,
    /// (height, width), 动态输入时使用
    pub image_size: (Option<u32>, Option<u32>),
    /// image_size 未给出时的动态输入边长
    pub default_size: u32,
}

impl OrtConfig {
    pub fn new(f: impl Into<String>, default_size: u32) -> Self {
        Self {
            f: f.into(),
            ep: OrtEP::CPU,
            trt_fp16: false,
            image_size: (None, None),
            default_size,
        }
    }

    pub fn with_args(mut self, args: &crate::Args) -> Self {
        self.ep = if args.trt {
            OrtEP::Trt(args.device_id)
        } else if args.cuda {
            OrtEP::CUDA(args.device_id)
        } else {
            OrtEP::CPU
        };
        self.trt_fp16 = args.fp16;
        self
    }

    pub fn with_image_size(mut self, height: Option<u32>, width: Option<u32>) -> Self {
        self.image_size = (height, width);
        self
    }
}

/// 推理后端接口, 模型只依赖这一层, 便于替换与测试
pub trait InferenceBackend {
    fn input_spec(&self) -> InputSpec;

    /// 单输入前向, 返回所有输出 (f32)
    fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 模型元数据中的类别名
    fn names(&self) -> Option<Vec<String>> {
        None
    }

    fn summary(&self) -> String {
        format!("{:?}", self.input_spec())
    }
}

pub struct OrtBackend {
    session: Session,
    input_name: String,
    output_names: Vec<String>,
    spec: InputSpec,
    ep: OrtEP,
    names: Option<Vec<String>>,
    author: Option<String>,
    version: Option<String>,
    dynamic: bool,
}

impl OrtBackend {
    pub fn build(args: OrtConfig) -> Result<Self> {
        if !Path::new(&args.f).is_file() {
            bail!("Model file not found: {}", args.f);
        }

        let builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
        let builder = match args.ep {
            OrtEP::Trt(id) => builder.with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(id)
                    .with_fp16(args.trt_fp16)
                    .build(),
                CUDAExecutionProvider::default().with_device_id(id).build(),
            ])?,
            OrtEP::CUDA(id) => builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(id)
                    .build()])?,
            OrtEP::CPU => builder,
        };
        let session = builder
            .commit_from_file(&args.f)
            .with_context(|| format!("Failed to load model {}", args.f))?;

        let input = session
            .inputs
            .first()
            .with_context(|| format!("Model {} has no inputs", args.f))?;
        let input_name = input.name.clone();
        let dims: Vec<i64> = input
            .input_type
            .tensor_shape()
            .map(|shape| shape.iter().copied().collect())
            .unwrap_or_default();
        let layout = InputLayout::from_shape(&dims).unwrap_or(InputLayout::Nchw);
        let (h_dim, w_dim) = match layout {
            InputLayout::Nchw => (dims.get(2), dims.get(3)),
            InputLayout::Nhwc => (dims.get(1), dims.get(2)),
        };
        let fixed = |d: Option<&i64>| d.copied().filter(|&v| v > 0).map(|v| v as u32);
        let dynamic = fixed(h_dim).is_none() || fixed(w_dim).is_none();
        let height = fixed(h_dim)
            .or(args.image_size.0)
            .unwrap_or(args.default_size);
        let width = fixed(w_dim)
            .or(args.image_size.1)
            .unwrap_or(args.default_size);

        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();

        let (names, author, version) = match session.metadata() {
            Ok(meta) => (
                meta.custom("names").ok().flatten().and_then(|s| parse_names(&s)),
                meta.custom("author").ok().flatten(),
                meta.custom("version").ok().flatten(),
            ),
            Err(_) => (None, None, None),
        };

        Ok(Self {
            session,
            input_name,
            output_names,
            spec: InputSpec {
                width,
                height,
                layout,
            },
            ep: args.ep,
            names,
            author,
            version,
            dynamic,
        })
    }

    pub fn author(&self) -> Option<&String> {
        self.author.as_ref()
    }

    pub fn version(&self) -> Option<&String> {
        self.version.as_ref()
    }
}

impl InferenceBackend for OrtBackend {
    fn input_spec(&self) -> InputSpec {
        self.spec
    }

    fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        let t = std::time::Instant::now();
        let input = Tensor::from_array(xs)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])?;
        if profile {
            log::info!("[ORT Inference]: {:?}", t.elapsed());
        }

        let mut ys = Vec::with_capacity(self.output_names.len());
        for name in self.output_names.iter() {
            let value = &outputs[name.as_str()];
            let y = match value.try_extract_array::<f32>() {
                Ok(y) => y.into_owned(),
                Err(_) => value
                    .try_extract_array::<half::f16>()
                    .with_context(|| format!("Unsupported output dtype for {}", name))?
                    .mapv(f32::from),
            };
            ys.push(y);
        }
        Ok(ys)
    }

    fn names(&self) -> Option<Vec<String>> {
        self.names.clone()
    }

    fn summary(&self) -> String {
        format!(
            "EP: {:?}{}, Input: {}x{} {:?} ({}){}",
            self.ep,
            if let OrtEP::CPU = self.ep {
                ""
            } else {
                " (May still fall back to CPU)"
            },
            self.spec.width,
            self.spec.height,
            self.spec.layout,
            if self.dynamic { "Dynamic" } else { "Const" },
            match self.author().zip(self.version()) {
                Some((author, ver)) => format!(", {} {}", author, ver),
                None => String::new(),
            },
        )
    }
}

/// 解析 Ultralytics names 元数据, 按 ID 排序
pub fn parse_names(s: &str) -> Option<Vec<String>> {
    let re = NAMES_RE.as_ref()?;
    let mut pairs: Vec<(usize, String)> = re
        .captures_iter(s)
        .filter_map(|c| {
            let id = c.get(1)?.as_str().parse::<usize>().ok()?;
            Some((id, c.get(2)?.as_str().to_string()))
        })
        .collect();
    if pairs.is_empty() {
        return None;
    }
    pairs.sort_by_key(|(id, _)| *id);
    Some(pairs.into_iter().map(|(_, name)| name).collect())
}
