// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 模型统一接口与实现
///
/// # 架构说明
///
/// - **YOLOv8**: 目标检测, 输出 `Vec<Detection>` (文件: `yolov8.rs`)
/// - **MiDaS**:  单目相对深度, 输出 `DepthMap` (文件: `midas.rs`)
///
/// 两者都只持有一个 `Box<dyn InferenceBackend>`, 由调用方构造一次、显式拥有,
/// 在整个处理循环内复用。
///
/// ## 使用示例
/// ```ignore
/// use yolo_depth_rs::models::{Model, YOLOv8};
///
/// let mut model = YOLOv8::new(&args, &config)?;
/// let detections = model.forward(&frame)?;
/// ```
use anyhow::Result;
use fast_image_resize as fr;
use image::RgbImage;
use ndarray::{Array, IxDyn};
use std::time::Instant;

use crate::ort_backend::{InferenceBackend, InputLayout, InputSpec};

pub mod midas;
pub mod yolov8;

pub use midas::MiDaS;
pub use yolov8::YOLOv8;

/// 统一的深度学习模型接口
///
/// ## 核心流程
/// ```text
/// 原始帧 → preprocess → ndarray张量
///          ↓
///     推理引擎 run
///          ↓
///     原始输出 → postprocess → Output
/// ```
pub trait Model {
    type Output;

    /// 预处理: 帧 → 模型输入张量 (NCHW 或 NHWC, 由模型输入形状决定)
    fn preprocess(&mut self, image: &RgbImage) -> Result<Array<f32, IxDyn>>;

    /// 推理: 执行模型前向传播
    fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        self.engine_mut().run(xs, profile)
    }

    /// 后处理: 原始输出 → 结果 (坐标/尺寸还原到原始帧)
    fn postprocess(&self, xs: Vec<Array<f32, IxDyn>>, image: &RgbImage) -> Result<Self::Output>;

    /// 完整的推理流程: preprocess → run → postprocess
    fn forward(&mut self, image: &RgbImage) -> Result<Self::Output> {
        let profile = self.profile();

        let t_pre = Instant::now();
        let xs = self.preprocess(image)?;
        if profile {
            log::info!("[{} Preprocess]: {:?}", self.name(), t_pre.elapsed());
        }

        let t_run = Instant::now();
        let ys = self.run(xs, profile)?;
        if profile {
            log::info!("[{} Inference]: {:?}", self.name(), t_run.elapsed());
        }

        let t_post = Instant::now();
        let ys = self.postprocess(ys, image)?;
        if profile {
            log::info!("[{} Postprocess]: {:?}", self.name(), t_post.elapsed());
        }
        Ok(ys)
    }

    fn name(&self) -> &'static str;

    fn profile(&self) -> bool {
        false
    }

    /// 获取底层推理引擎的可变引用
    fn engine_mut(&mut self) -> &mut dyn InferenceBackend;

    /// 打印模型信息
    fn summary(&self);
}

/// 缩放到模型输入尺寸 (双线性), 尺寸相同时直接复制
pub(crate) fn resize_rgb(image: &RgbImage, width: u32, height: u32) -> Result<Vec<u8>> {
    if image.dimensions() == (width, height) {
        return Ok(image.as_raw().clone());
    }

    let src_image = fr::images::ImageRef::new(
        image.width(),
        image.height(),
        image.as_raw(),
        fr::PixelType::U8x3,
    )?;
    let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    resizer.resize(
        &src_image,
        &mut dst_image,
        &fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
    )?;
    Ok(dst_image.into_vec())
}

/// RGB 帧 → batch=1 输入张量, `normalize(channel, value)` 逐通道归一化
pub(crate) fn to_input_tensor(
    image: &RgbImage,
    spec: &InputSpec,
    normalize: impl Fn(usize, u8) -> f32,
) -> Result<Array<f32, IxDyn>> {
    let (w, h) = (spec.width as usize, spec.height as usize);
    let pixels = resize_rgb(image, spec.width, spec.height)?;

    let mut ys = Array::zeros(spec.shape().to_vec()).into_dyn();
    for (i, rgb) in pixels.chunks_exact(3).enumerate() {
        let (y, x) = (i / w, i % w);
        if y >= h {
            break;
        }
        for (c, &v) in rgb.iter().enumerate() {
            let v = normalize(c, v);
            match spec.layout {
                InputLayout::Nchw => ys[[0, c, y, x]] = v,
                InputLayout::Nhwc => ys[[0, y, x, c]] = v,
            }
        }
    }
    Ok(ys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_tensor_layouts() {
        let mut img = RgbImage::new(4, 2);
        img.put_pixel(3, 1, Rgb([255, 0, 51]));

        let nchw = InputSpec {
            width: 4,
            height: 2,
            layout: InputLayout::Nchw,
        };
        let xs = to_input_tensor(&img, &nchw, |_, v| v as f32 / 255.).unwrap();
        assert_eq!(xs.shape(), &[1, 3, 2, 4]);
        assert!((xs[[0, 0, 1, 3]] - 1.).abs() < 1e-6);
        assert!((xs[[0, 2, 1, 3]] - 0.2).abs() < 1e-6);

        let nhwc = InputSpec {
            layout: InputLayout::Nhwc,
            ..nchw
        };
        let ys = to_input_tensor(&img, &nhwc, |_, v| v as f32 / 255.).unwrap();
        assert_eq!(ys.shape(), &[1, 2, 4, 3]);
        assert!((ys[[0, 1, 3, 0]] - 1.).abs() < 1e-6);
        assert!((ys[[0, 1, 3, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_resize_to_input() {
        let img = RgbImage::from_pixel(64, 48, Rgb([10, 20, 30]));
        let pixels = resize_rgb(&img, 32, 32).unwrap();
        assert_eq!(pixels.len(), 32 * 32 * 3);
        assert_eq!(&pixels[..3], &[10, 20, 30]);
    }
}
