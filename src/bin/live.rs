/// 实时检测 + 测距 (摄像头 → 窗口)
///
/// cargo run --release --bin live -- --model yolov8n.onnx --depth-model midas_small.onnx --strategy depth-inverse
use anyhow::Result;
use clap::Parser;
use std::path::Path;
use yolo_depth_rs::input::{get_camera_devices, open_source};
use yolo_depth_rs::renderer::window::{quit_requested, window_conf, FrameWindow};
use yolo_depth_rs::{Args, Pipeline, PipelineConfig};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        log::error!("❌ {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    let config = PipelineConfig::from_args(&args);
    config.print_summary();

    // 模型在进入循环前加载, 失败直接退出
    let mut pipeline = Pipeline::new(&args, &config)?;

    if !Path::new(&args.source).exists() {
        for (index, name) in get_camera_devices() {
            log::info!("  📹 [{}] {}", index, name);
        }
    }
    let mut source = open_source(&args.source, &args.video_size, args.framerate)?;

    let mut window = FrameWindow::new();
    let mut processed = 0usize;

    loop {
        if quit_requested() {
            log::info!("🛑 收到退出信号");
            break;
        }
        if args.max_frames.is_some_and(|max| processed >= max) {
            break;
        }

        let Some(frame) = source.next_frame()? else {
            log::info!("📭 输入结束");
            break;
        };
        let output = pipeline.process(&frame)?;

        window.update(&output.composite());
        window.draw();
        processed += 1;

        macroquad::window::next_frame().await;
    }

    log::info!("✅ 共处理 {} 帧", processed);
    Ok(())
}
