//! macroquad 显示窗口: 把标注好的帧上传为纹理并按比例居中显示

use image::RgbImage;
use macroquad::prelude::*;

pub const WINDOW_TITLE: &str = "YOLO Depth";

pub fn window_conf() -> Conf {
    Conf {
        window_title: WINDOW_TITLE.to_owned(),
        window_width: 1280,
        window_height: 480,
        high_dpi: false,
        ..Default::default()
    }
}

/// Q / Esc 退出
pub fn quit_requested() -> bool {
    is_key_pressed(KeyCode::Q) || is_key_pressed(KeyCode::Escape)
}

pub fn rgb_to_rgba(img: &RgbImage) -> Vec<u8> {
    let mut rgba = Vec::with_capacity((img.width() * img.height() * 4) as usize);
    for chunk in img.as_raw().chunks_exact(3) {
        rgba.extend_from_slice(chunk);
        rgba.push(255);
    }
    rgba
}

#[derive(Default)]
pub struct FrameWindow {
    texture: Option<Texture2D>,
}

impl FrameWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// 上传新帧; 只在分辨率变化时重建纹理
    pub fn update(&mut self, frame: &RgbImage) {
        let (w, h) = (frame.width() as u16, frame.height() as u16);
        let bytes = rgb_to_rgba(frame);

        let needs_rebuild = match &self.texture {
            Some(tex) => tex.width() != w as f32 || tex.height() != h as f32,
            None => true,
        };

        if needs_rebuild {
            let texture = Texture2D::from_rgba8(w, h, &bytes);
            texture.set_filter(FilterMode::Linear);
            self.texture = Some(texture);
        } else if let Some(tex) = &self.texture {
            tex.update(&Image {
                bytes,
                width: w,
                height: h,
            });
        }
    }

    /// 保持宽高比居中绘制
    pub fn draw(&self) {
        clear_background(BLACK);
        let Some(texture) = &self.texture else {
            return;
        };

        let scale = (screen_width() / texture.width()).min(screen_height() / texture.height());
        let scaled_width = texture.width() * scale;
        let scaled_height = texture.height() * scale;
        let x = (screen_width() - scaled_width) / 2.0;
        let y = (screen_height() - scaled_height) / 2.0;

        draw_texture_ex(
            texture,
            x,
            y,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(scaled_width, scaled_height)),
                ..Default::default()
            },
        );
    }
}
