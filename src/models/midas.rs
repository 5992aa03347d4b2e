// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// MiDaS 单目相对深度模型

use anyhow::{bail, Context, Result};
use image::RgbImage;
use ndarray::{Array, Ix2, IxDyn};

use super::{to_input_tensor, Model};
use crate::ort_backend::{InferenceBackend, InputSpec, OrtBackend, OrtConfig};
use crate::{Args, DepthMap};

/// MiDaS small 默认输入边长
pub const DEPTH_SIZE: u32 = 256;

/// ImageNet 均值 / 方差 (RGB)
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

pub struct MiDaS {
    engine: Box<dyn InferenceBackend>,
    spec: InputSpec,
    profile: bool,
}

impl MiDaS {
    pub fn new(path: &str, args: &Args) -> Result<Self> {
        let ort_args = OrtConfig::new(path, DEPTH_SIZE)
            .with_args(args)
            .with_image_size(args.depth_size, args.depth_size);
        let engine = OrtBackend::build(ort_args)
            .with_context(|| format!("Failed to build depth model from {}", path))?;
        let mut model = Self::with_engine(Box::new(engine));
        model.profile = args.profile;
        Ok(model)
    }

    pub fn with_engine(engine: Box<dyn InferenceBackend>) -> Self {
        let spec = engine.input_spec();
        Self {
            engine,
            spec,
            profile: false,
        }
    }
}

/// 去掉所有长度为 1 的维度, 剩余必须是 (H, W)
fn squeeze_depth(xs: Array<f32, IxDyn>) -> Result<Array<f32, Ix2>> {
    let shape: Vec<usize> = xs.shape().iter().copied().filter(|&d| d != 1).collect();
    if shape.len() != 2 {
        bail!("Unexpected depth output shape {:?}", xs.shape());
    }
    let ys = xs
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order((shape[0], shape[1]))?;
    Ok(ys)
}

impl Model for MiDaS {
    type Output = DepthMap;

    /// /255 后按 ImageNet 均值方差归一化
    fn preprocess(&mut self, image: &RgbImage) -> Result<Array<f32, IxDyn>> {
        to_input_tensor(image, &self.spec, |c, v| {
            (v as f32 / 255.0 - MEAN[c]) / STD[c]
        })
    }

    /// 原始分辨率深度 → 缩放到原始帧尺寸
    fn postprocess(&self, xs: Vec<Array<f32, IxDyn>>, image: &RgbImage) -> Result<DepthMap> {
        let ys = xs
            .into_iter()
            .next()
            .context("Depth model returned no outputs")?;
        let depth = DepthMap::new(squeeze_depth(ys)?);
        let (w, h) = image.dimensions();
        depth.resize(w, h)
    }

    fn name(&self) -> &'static str {
        "MiDaS"
    }

    fn profile(&self) -> bool {
        self.profile
    }

    fn engine_mut(&mut self) -> &mut dyn InferenceBackend {
        self.engine.as_mut()
    }

    fn summary(&self) {
        log::info!("🌊 MiDaS | {}", self.engine.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ort_backend::InputLayout;
    use ndarray::Array4;

    /// 按输入张量第一个像素生成常数深度图的假后端
    struct EchoBackend {
        spec: InputSpec,
        out_shape: Vec<usize>,
    }

    impl InferenceBackend for EchoBackend {
        fn input_spec(&self) -> InputSpec {
            self.spec
        }

        fn run(&mut self, xs: Array<f32, IxDyn>, _profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
            let v = xs.iter().next().copied().unwrap_or_default();
            Ok(vec![Array::from_elem(IxDyn(&self.out_shape), v)])
        }
    }

    fn midas(layout: InputLayout, out_shape: &[usize]) -> MiDaS {
        MiDaS::with_engine(Box::new(EchoBackend {
            spec: InputSpec {
                width: 256,
                height: 256,
                layout,
            },
            out_shape: out_shape.to_vec(),
        }))
    }

    #[test]
    fn test_normalization_constants() {
        let mut model = midas(InputLayout::Nhwc, &[1, 256, 256, 1]);
        let img = RgbImage::from_pixel(8, 8, image::Rgb([255, 0, 128]));
        let xs = model.preprocess(&img).unwrap();
        assert_eq!(xs.shape(), &[1, 256, 256, 3]);
        assert!((xs[[0, 0, 0, 0]] - (1.0 - 0.485) / 0.229).abs() < 1e-4);
        assert!((xs[[0, 0, 0, 1]] - (0.0 - 0.456) / 0.224).abs() < 1e-4);
    }

    #[test]
    fn test_depth_resized_to_frame() {
        let mut model = midas(InputLayout::Nchw, &[1, 256, 256]);
        let frame = RgbImage::new(320, 240);
        let depth = model.forward(&frame).unwrap();
        assert_eq!((depth.width(), depth.height()), (320, 240));
    }

    #[test]
    fn test_squeeze_depth() {
        let xs = Array4::<f32>::zeros((1, 1, 4, 6)).into_dyn();
        assert_eq!(squeeze_depth(xs).unwrap().dim(), (4, 6));
        let bad = Array4::<f32>::zeros((1, 2, 4, 6)).into_dyn();
        assert!(squeeze_depth(bad).is_err());
    }
}
