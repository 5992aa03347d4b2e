/// FFmpeg解码过滤器: 摄像头帧 (rgb24) → RgbImage
///
/// 上游已经通过 `format=rgb24` 完成像素格式转换, 这里只按行拷贝去掉 linesize 填充。
use crossbeam_channel::{Sender, TrySendError};
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;
use std::time::Instant;

#[derive(Clone)]
pub struct DecodeFilter {
    tx: Sender<RgbImage>,
    pub count: usize,
    pub last: Instant,
    pub current_fps: f64,
    pub dropped_frames: usize,
    pub total_frames: usize,
}

impl DecodeFilter {
    pub fn new(tx: Sender<RgbImage>) -> Self {
        Self {
            tx,
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
            dropped_frames: 0,
            total_frames: 0,
        }
    }

    fn report_fps(&mut self) {
        let elapsed = self.last.elapsed().as_secs_f64();
        if elapsed < 1.0 {
            return;
        }
        self.current_fps = self.count as f64 / elapsed;
        let drop_rate = self.dropped_frames as f64 / self.total_frames.max(1) as f64 * 100.0;
        log::debug!(
            "📺 采集统计: {:.1}fps | 总帧{} | 丢弃{} ({:.1}%)",
            self.current_fps,
            self.total_frames,
            self.dropped_frames,
            drop_rate
        );
        self.last = Instant::now();
        self.count = 0;
    }
}

/// 按行拷贝 packed RGB 数据, 丢弃每行末尾的对齐填充
pub fn copy_rgb_rows(src: &[u8], width: usize, height: usize, stride: usize) -> Option<RgbImage> {
    let row_bytes = width * 3;
    if stride < row_bytes || src.len() < stride * (height.saturating_sub(1)) + row_bytes {
        return None;
    }
    let mut buf = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        buf.extend_from_slice(&src[start..start + row_bytes]);
    }
    RgbImage::from_raw(width as u32, height as u32, buf)
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        log::info!("✅ 采集线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        self.total_frames += 1;

        unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as usize;
            let h = (*frame.as_ptr()).height as usize;
            let data = (*frame.as_ptr()).data[0];
            let stride = (*frame.as_ptr()).linesize[0];

            if w == 0 || h == 0 || data.is_null() || stride <= 0 {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let stride = stride as usize;
            let len = stride * (h - 1) + w * 3;
            let src = std::slice::from_raw_parts(data as *const u8, len);
            let Some(image) = copy_rgb_rows(src, w, h, stride) else {
                self.dropped_frames += 1;
                return Ok(None);
            };

            // 消费者跟不上时丢帧, 始终处理最新画面
            match self.tx.try_send(image) {
                Ok(()) => self.count += 1,
                Err(TrySendError::Full(_)) => self.dropped_frames += 1,
                Err(TrySendError::Disconnected(_)) => {
                    return Err("Frame receiver closed".to_string());
                }
            }
        }

        self.report_fps();
        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        log::info!(
            "✅ 采集线程退出 (总帧{}, 丢弃{})",
            self.total_frames,
            self.dropped_frames
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_rgb_rows_strips_padding() {
        // 2x2, 每行 6 字节数据 + 2 字节填充
        let src = [1, 2, 3, 4, 5, 6, 0, 0, 7, 8, 9, 10, 11, 12];
        let img = copy_rgb_rows(&src, 2, 2, 8).unwrap();
        assert_eq!(img.as_raw(), &vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_copy_rgb_rows_rejects_short_buffer() {
        assert!(copy_rgb_rows(&[0; 5], 2, 1, 6).is_none());
        assert!(copy_rgb_rows(&[0; 12], 2, 2, 4).is_none());
    }
}
