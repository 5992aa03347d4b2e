//! 稠密相对深度图 (MiDaS 输出, 已缩放到原图尺寸)

use anyhow::{Context, Result};
use fast_image_resize as fr;
use image::{Rgb, RgbImage};
use ndarray::Array2;

/// inferno 色表控制点 (等间距), 线性插值
const INFERNO: [(u8, u8, u8); 9] = [
    (0, 0, 4),
    (31, 12, 72),
    (85, 15, 109),
    (136, 34, 106),
    (186, 54, 85),
    (227, 89, 51),
    (249, 140, 10),
    (249, 201, 50),
    (252, 255, 164),
];

/// 深度图: 行 = 高, 列 = 宽; 值越大越近 (MiDaS 逆深度)
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    data: Array2<f32>,
    min: f32,
    max: f32,
}

impl DepthMap {
    pub fn new(data: Array2<f32>) -> Self {
        let (min, max) = data
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let (min, max) = if min > max { (0., 0.) } else { (min, max) };
        Self { data, min, max }
    }

    pub fn from_raw(width: u32, height: u32, values: Vec<f32>) -> Result<Self> {
        let data = Array2::from_shape_vec((height as usize, width as usize), values)
            .context("Depth values do not match the given size")?;
        Ok(Self::new(data))
    }

    /// 常数深度图, 主要用于测试与占位
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self::new(Array2::from_elem((height as usize, width as usize), value))
    }

    pub fn width(&self) -> u32 {
        self.data.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.data.nrows() as u32
    }

    /// 在限制到画面内的整数坐标处采样, 空深度图返回 0
    pub fn sample(&self, x: i64, y: i64) -> f32 {
        if self.data.is_empty() {
            return 0.;
        }
        let x = x.clamp(0, self.data.ncols() as i64 - 1) as usize;
        let y = y.clamp(0, self.data.nrows() as i64 - 1) as usize;
        self.data[[y, x]]
    }

    /// min-max 归一化到 0-255; 平坦深度图全部为 0
    pub fn normalize_value(&self, v: f32) -> u8 {
        let range = self.max - self.min;
        if range <= f32::EPSILON || !v.is_finite() {
            return 0;
        }
        ((v - self.min) / range * 255.).clamp(0., 255.) as u8
    }

    pub fn normalized(&self) -> Array2<u8> {
        self.data.mapv(|v| self.normalize_value(v))
    }

    /// 双线性缩放到 (width, height), 按 f32 像素计算, 不截断数值范围
    pub fn resize(&self, width: u32, height: u32) -> Result<Self> {
        if width == self.width() && height == self.height() {
            return Ok(self.clone());
        }
        if width == 0 || height == 0 || self.data.is_empty() {
            return Ok(Self::filled(width, height, 0.));
        }

        let pixels: Vec<fr::pixels::F32> =
            self.data.iter().map(|&v| fr::pixels::F32::new(v)).collect();
        let src_image = fr::images::TypedImageRef::new(self.width(), self.height(), &pixels)?;
        let mut dst_image = fr::images::TypedImage::<fr::pixels::F32>::new(width, height);

        let mut resizer = fr::Resizer::new();
        resizer.resize_typed(
            &src_image,
            &mut dst_image,
            &fr::ResizeOptions::new()
                .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
        )?;

        let values = dst_image.pixels().iter().map(|p| p.0).collect();
        Self::from_raw(width, height, values)
    }

    /// inferno 伪彩色
    pub fn colorize(&self) -> RgbImage {
        let (w, h) = (self.width(), self.height());
        let mut img = RgbImage::new(w, h);
        for ((y, x), &v) in self.data.indexed_iter() {
            img.put_pixel(x as u32, y as u32, inferno(self.normalize_value(v)));
        }
        img
    }
}

fn inferno(v: u8) -> Rgb<u8> {
    let t = v as f32 / 255. * (INFERNO.len() - 1) as f32;
    let i = (t.floor() as usize).min(INFERNO.len() - 2);
    let f = t - i as f32;
    let (a, b) = (INFERNO[i], INFERNO[i + 1]);
    let lerp = |p: u8, q: u8| (p as f32 + (q as f32 - p as f32) * f).round() as u8;
    Rgb([lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2)])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> DepthMap {
        DepthMap::from_raw(4, 2, vec![0., 1., 2., 3., 4., 5., 6., 7.]).unwrap()
    }

    #[test]
    fn test_sample_is_clamped() {
        let d = ramp();
        assert_eq!(d.sample(1, 1), 5.);
        assert_eq!(d.sample(-10, -10), 0.);
        assert_eq!(d.sample(100, 100), 7.);
        assert_eq!(DepthMap::filled(0, 0, 1.).sample(0, 0), 0.);
    }

    #[test]
    fn test_normalization() {
        let d = ramp();
        assert_eq!(d.normalize_value(0.), 0);
        assert_eq!(d.normalize_value(7.), 255);
        let n = d.normalized();
        assert_eq!(n[[0, 0]], 0);
        assert_eq!(n[[1, 3]], 255);

        let flat = DepthMap::filled(3, 3, 2.5);
        assert!(flat.normalized().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_resize_and_colorize() {
        let d = DepthMap::filled(8, 4, 3.).resize(16, 12).unwrap();
        assert_eq!((d.width(), d.height()), (16, 12));
        assert!((d.sample(5, 5) - 3.).abs() < 1e-4);

        let img = ramp().colorize();
        assert_eq!(img.dimensions(), (4, 2));
        assert_eq!(*img.get_pixel(0, 0), Rgb([0, 0, 4]));
        assert_eq!(*img.get_pixel(3, 1), Rgb([252, 255, 164]));
    }

    #[test]
    fn test_resize_keeps_values_above_one() {
        let d = DepthMap::filled(256, 256, 10.).resize(640, 640).unwrap();
        for (x, y) in [(0, 0), (320, 240), (639, 639), (120, 90)] {
            assert!((d.sample(x, y) - 10.).abs() < 1e-3);
        }

        // MiDaS 输出通常在数百到数千之间
        let ramp = DepthMap::from_raw(2, 1, vec![100., 3000.]).unwrap();
        let up = ramp.resize(8, 2).unwrap();
        assert!((up.sample(0, 0) - 100.).abs() < 1e-2);
        assert!((up.sample(7, 1) - 3000.).abs() < 1e-1);
        assert!(up.sample(4, 0) > 100. && up.sample(4, 0) < 3000.);
        assert_eq!(up.normalize_value(up.sample(7, 1)), 255);

        let empty = DepthMap::filled(4, 4, 5.).resize(0, 0).unwrap();
        assert_eq!(empty.sample(0, 0), 0.);
    }

    #[test]
    fn test_from_raw_size_mismatch() {
        assert!(DepthMap::from_raw(3, 3, vec![0.; 4]).is_err());
    }
}
