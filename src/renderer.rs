//! 标注绘制: 检测框 + 标签背景 + 标签文字 (imageproc / ab_glyph)
//!
//! 所有坐标都会被限制在画布内, 绘制过程不产生错误。

#[cfg(feature = "display")]
pub mod window;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;

use crate::detection::AnnotatedDetection;

/// 未指定字体时依次尝试的系统字体
const FALLBACK_FONTS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// 配色
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Style {
    pub box_color: Rgb<u8>,
    pub label_background: Rgb<u8>,
    pub text_color: Rgb<u8>,
}

impl Style {
    /// 彩色画面: 绿框 + 绿底黑字
    pub fn color_view() -> Self {
        Self {
            box_color: Rgb([0, 255, 0]),
            label_background: Rgb([0, 255, 0]),
            text_color: Rgb([0, 0, 0]),
        }
    }

    /// 深度伪彩色画面: 白框 + 白底黑字
    pub fn depth_view() -> Self {
        Self {
            box_color: Rgb([255, 255, 255]),
            label_background: Rgb([255, 255, 255]),
            text_color: Rgb([0, 0, 0]),
        }
    }
}

pub struct Renderer {
    font: Option<FontVec>,
    scale: PxScale,
    thickness: u32,
}

impl Renderer {
    /// 加载字体; 找不到字体时只画框和标签底色
    pub fn new(font_path: Option<&str>) -> Self {
        let candidates: Vec<&str> = match font_path {
            Some(p) => vec![p],
            None => FALLBACK_FONTS.to_vec(),
        };
        let font = candidates.into_iter().find_map(|p| load_font(Path::new(p)));
        if font.is_none() {
            log::warn!("⚠️ 未找到可用字体, 标签文字将不会绘制 (使用 --font 指定)");
        }
        Self::with_font(font)
    }

    pub fn with_font(font: Option<FontVec>) -> Self {
        Self {
            font,
            scale: PxScale::from(16.0),
            thickness: 2,
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// 文字尺寸; 无字体时按半个字号估算字宽
    pub fn text_metrics(&self, text: &str) -> (u32, u32) {
        match &self.font {
            Some(font) => text_size(self.scale, font, text),
            None => {
                let px = self.scale.y as u32;
                (text.chars().count() as u32 * px / 2, px)
            }
        }
    }

    /// 在画布上绘制所有检测结果
    pub fn draw(&self, canvas: &mut RgbImage, detections: &[AnnotatedDetection], style: &Style) {
        if canvas.width() == 0 || canvas.height() == 0 {
            return;
        }
        for d in detections {
            self.draw_box(canvas, d, style);
            self.draw_label(canvas, d, style);
        }
    }

    fn draw_box(&self, canvas: &mut RgbImage, d: &AnnotatedDetection, style: &Style) {
        let b = d.detection.bbox();
        let (w, h) = (canvas.width() as i32, canvas.height() as i32);
        let x1 = (b.xmin() as i32).clamp(0, w - 1);
        let y1 = (b.ymin() as i32).clamp(0, h - 1);
        let x2 = (b.xmax() as i32).clamp(0, w - 1);
        let y2 = (b.ymax() as i32).clamp(0, h - 1);

        for t in 0..self.thickness as i32 {
            let bw = (x2 - x1 - 2 * t).max(1) as u32;
            let bh = (y2 - y1 - 2 * t).max(1) as u32;
            draw_hollow_rect_mut(canvas, Rect::at(x1 + t, y1 + t).of_size(bw, bh), style.box_color);
        }
    }

    /// 标签放在框的左上角上方, 贴顶时下移到画布内
    fn draw_label(&self, canvas: &mut RgbImage, d: &AnnotatedDetection, style: &Style) {
        let text = d.caption();
        let (tw, th) = self.text_metrics(&text);
        let (w, h) = (canvas.width() as i32, canvas.height() as i32);
        let pad = 3;

        let bg_w = (tw as i32 + 2 * pad).max(1);
        let bg_h = (th as i32 + 2 * pad).max(1);
        let x = (d.detection.bbox().xmin() as i32).clamp(0, (w - bg_w).max(0));
        let y = (d.detection.bbox().ymin() as i32 - bg_h).clamp(0, (h - bg_h).max(0));

        draw_filled_rect_mut(
            canvas,
            Rect::at(x, y).of_size(bg_w as u32, bg_h as u32),
            style.label_background,
        );
        if let Some(font) = &self.font {
            draw_text_mut(canvas, style.text_color, x + pad, y + pad, self.scale, font, &text);
        }
    }
}

fn load_font(path: &Path) -> Option<FontVec> {
    let bytes = std::fs::read(path).ok()?;
    match FontVec::try_from_vec(bytes) {
        Ok(font) => {
            log::info!("🔤 字体已加载: {}", path.display());
            Some(font)
        }
        Err(e) => {
            log::warn!("⚠️ 字体解析失败 {}: {}", path.display(), e);
            None
        }
    }
}

/// 彩色画面与深度画面左右拼接 (高度取两者较大值)
pub fn side_by_side(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let width = left.width() + right.width();
    let height = left.height().max(right.height());
    let mut out = RgbImage::new(width, height);
    image::imageops::replace(&mut out, left, 0, 0);
    image::imageops::replace(&mut out, right, left.width() as i64, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bbox, Detection, Distance};

    fn annotated(x: f32, y: f32, w: f32, h: f32) -> AnnotatedDetection {
        AnnotatedDetection {
            detection: Detection::new(0, 0.9, Bbox::new(x, y, w, h)),
            label: "person".into(),
            distance: Distance::Meters(2.5),
        }
    }

    #[test]
    fn test_draws_box_and_label_background() {
        let renderer = Renderer::with_font(None);
        let mut canvas = RgbImage::new(200, 200);
        renderer.draw(&mut canvas, &[annotated(50., 80., 40., 60.)], &Style::color_view());

        // 左边框
        assert_eq!(*canvas.get_pixel(50, 120), Rgb([0, 255, 0]));
        // 框内部保持原样
        assert_eq!(*canvas.get_pixel(70, 110), Rgb([0, 0, 0]));
        // 标签底色在框上方
        assert_eq!(*canvas.get_pixel(55, 75), Rgb([0, 255, 0]));
    }

    #[test]
    fn test_off_canvas_boxes_are_clamped() {
        let renderer = Renderer::with_font(None);
        let mut canvas = RgbImage::new(64, 48);
        let ds = [
            annotated(-100., -100., 20., 20.),
            annotated(500., 500., 80., 80.),
            annotated(0., 0., 0., 0.),
            annotated(10., 10., 1000., 1000.),
        ];
        renderer.draw(&mut canvas, &ds, &Style::depth_view());

        let mut empty = RgbImage::new(0, 0);
        renderer.draw(&mut empty, &ds, &Style::color_view());
    }

    #[test]
    fn test_no_detections_is_noop() {
        let renderer = Renderer::with_font(None);
        let mut canvas = RgbImage::from_pixel(8, 8, Rgb([7, 7, 7]));
        renderer.draw(&mut canvas, &[], &Style::color_view());
        assert!(canvas.pixels().all(|p| *p == Rgb([7, 7, 7])));
    }

    #[test]
    fn test_side_by_side() {
        let left = RgbImage::from_pixel(4, 3, Rgb([1, 1, 1]));
        let right = RgbImage::from_pixel(5, 2, Rgb([2, 2, 2]));
        let out = side_by_side(&left, &right);
        assert_eq!(out.dimensions(), (9, 3));
        assert_eq!(*out.get_pixel(3, 2), Rgb([1, 1, 1]));
        assert_eq!(*out.get_pixel(4, 0), Rgb([2, 2, 2]));
    }
}
