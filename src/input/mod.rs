/// 视频输入系统 (Video Input System)
///
/// - ImageSource:  单张图片 / 图片目录 (按文件名排序)
/// - CameraSource: 本地摄像头 (DirectShow/AVFoundation/V4L2), 需要 `camera` 特性
/// - DecodeFilter: FFmpeg 帧 → RGB 帧
#[cfg(feature = "camera")]
pub mod camera;
#[cfg(feature = "camera")]
pub mod decode_filter;
pub mod images;

#[cfg(feature = "camera")]
pub use camera::{get_camera_devices, CameraSource};
#[cfg(feature = "camera")]
pub use decode_filter::DecodeFilter;
pub use images::ImageSource;

use anyhow::Result;
use image::RgbImage;
use std::path::Path;

/// 一帧 RGB 画面, 处理完即丢弃
#[derive(Clone, Debug)]
pub struct Frame {
    pub id: u64,
    pub image: RgbImage,
}

/// 帧来源: 阻塞直到拿到一帧; 流结束返回 Ok(None), 读取失败返回 Err
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// 根据 --source 打开输入: 已存在的文件/目录按图片读取, 否则视为摄像头
pub fn open_source(source: &str, video_size: &str, framerate: u32) -> Result<Box<dyn FrameSource>> {
    if Path::new(source).exists() && !source.starts_with("/dev/video") {
        return Ok(Box::new(ImageSource::open(source)?));
    }
    open_camera(source, video_size, framerate)
}

#[cfg(feature = "camera")]
fn open_camera(source: &str, video_size: &str, framerate: u32) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(CameraSource::open(source, video_size, framerate)?))
}

#[cfg(not(feature = "camera"))]
fn open_camera(source: &str, _video_size: &str, _framerate: u32) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!(
        "Source {} is not a file or directory and camera support is disabled",
        source
    )
}
