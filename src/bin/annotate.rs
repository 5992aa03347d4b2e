/// 离线标注: 图片 / 图片目录 (或摄像头) → 标注后的 PNG
///
/// cargo run --release --bin annotate -- --model yolov8n.onnx --source ./images
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use yolo_depth_rs::input::open_source;
use yolo_depth_rs::pipeline::ImageDirSink;
use yolo_depth_rs::{gen_time_string, Args, Pipeline, PipelineConfig};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = PipelineConfig::from_args(&args);
    config.print_summary();

    let mut pipeline = Pipeline::new(&args, &config)?;
    let mut source = open_source(&args.source, &args.video_size, args.framerate)?;

    let output = args
        .output
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("runs/annotate").join(gen_time_string("-")));
    let mut sink = ImageDirSink::new(&output)?;

    pipeline.run(source.as_mut(), &mut sink, args.max_frames)?;
    log::info!("💾 已保存 {} 张标注图片到 {}", sink.saved(), output.display());
    Ok(())
}
