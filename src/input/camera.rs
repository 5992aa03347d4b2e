//! 摄像头输入模块
//!
//! 处理本地摄像头输入,支持 DirectShow(Windows) / AVFoundation(macOS) / V4L2(Linux)。
//! 采集在独立线程中运行, 画面通过有界通道交给处理循环。

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use image::RgbImage;
use std::thread::JoinHandle;

use super::decode_filter::DecodeFilter;
use super::{Frame, FrameSource};

/// 采集线程与处理循环之间最多缓存的帧数
const FRAME_QUEUE: usize = 2;

#[cfg(target_os = "windows")]
const CAPTURE_FORMAT: &str = "dshow";
#[cfg(target_os = "macos")]
const CAPTURE_FORMAT: &str = "avfoundation";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const CAPTURE_FORMAT: &str = "v4l2";

pub struct CameraSource {
    rx: Receiver<RgbImage>,
    next_id: u64,
    _worker: JoinHandle<()>,
}

impl CameraSource {
    /// 打开摄像头; 设备无法打开时返回错误
    pub fn open(source: &str, video_size: &str, framerate: u32) -> Result<Self> {
        let url = camera_url(source);
        log::info!("📷 打开摄像头: {} (格式 {}, {} @ {}fps)", url, CAPTURE_FORMAT, video_size, framerate);

        let (tx, rx) = bounded::<RgbImage>(FRAME_QUEUE);
        let (status_tx, status_rx) = bounded::<std::result::Result<(), String>>(1);
        let video_size = video_size.to_string();

        let worker = std::thread::Builder::new()
            .name("camera-capture".into())
            .spawn(move || {
                let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
                let pipe = pipe.filter("decode", Box::new(DecodeFilter::new(tx)));
                let out = create_null_output().add_frame_pipeline(pipe);

                let framerate = framerate.to_string();
                let input = Input::new(url.as_str()).set_format(CAPTURE_FORMAT).set_input_opts(
                    [
                        ("framerate", framerate.as_str()),
                        ("video_size", video_size.as_str()),
                    ]
                    .into(),
                );

                let ctx = match FfmpegContext::builder()
                    .input(input)
                    .filter_desc("format=rgb24")
                    .output(out)
                    .build()
                {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        let _ = status_tx.send(Err(format!("构建采集上下文失败: {}", e)));
                        return;
                    }
                };

                let sch = match ctx.start() {
                    Ok(sch) => sch,
                    Err(e) => {
                        let _ = status_tx.send(Err(format!("启动采集失败: {}", e)));
                        return;
                    }
                };
                let _ = status_tx.send(Ok(()));

                if let Err(e) = sch.wait() {
                    log::warn!("📹 采集结束: {}", e);
                } else {
                    log::info!("📹 采集结束");
                }
            })?;

        match status_rx.recv() {
            Ok(Ok(())) => {
                log::info!("✅ 摄像头连接成功");
                Ok(Self {
                    rx,
                    next_id: 0,
                    _worker: worker,
                })
            }
            Ok(Err(e)) => Err(anyhow!("Cannot open camera {}: {}", source, e)),
            Err(_) => Err(anyhow!("Cannot open camera {}: capture thread exited", source)),
        }
    }
}

impl FrameSource for CameraSource {
    /// 阻塞等待下一帧; 采集线程退出后返回 None
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.rx.recv() {
            Ok(image) => {
                let id = self.next_id;
                self.next_id += 1;
                Ok(Some(Frame { id, image }))
            }
            Err(_) => Ok(None),
        }
    }
}

/// 数字按设备索引解析, 其他字符串原样作为设备名/路径
fn camera_url(source: &str) -> String {
    let Ok(index) = source.parse::<usize>() else {
        #[cfg(target_os = "windows")]
        if !source.starts_with("video=") {
            return format!("video={}", source);
        }
        return source.to_string();
    };

    #[cfg(target_os = "windows")]
    {
        let name = get_camera_devices()
            .into_iter()
            .find(|(i, _)| *i == index)
            .map(|(_, name)| name)
            .unwrap_or_else(|| index.to_string());
        format!("video={}", name)
    }
    #[cfg(target_os = "macos")]
    {
        format!("{}", index)
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        format!("/dev/video{}", index)
    }
}

/// 获取可用的摄像头设备列表
pub fn get_camera_devices() -> Vec<(usize, String)> {
    match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => devices.into_iter().enumerate().collect(),
        Err(e) => {
            log::warn!("⚠️ 获取摄像头列表失败: {}", e);
            vec![]
        }
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn test_camera_url() {
        assert_eq!(camera_url("0"), "/dev/video0");
        assert_eq!(camera_url("2"), "/dev/video2");
        assert_eq!(camera_url("/dev/video5"), "/dev/video5");
    }
}
