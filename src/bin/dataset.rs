/// 数据集整理工具
///
/// cargo run --bin dataset -- split --src unzipped --dst unzipped_data
/// cargo run --bin dataset -- merge --src unzipped_data --dst dataset
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use yolo_depth_rs::dataset::{merge_datasets, split_dataset, SplitOptions};
use yolo_depth_rs::labels::DATASET_CLASSES;

#[derive(Parser, Debug)]
#[command(author, version, about = "YOLO 数据集整理 (划分 / 合并)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 每个类别目录 → 按文件名配对 → 固定种子划分 train / val
    Split {
        /// 已解压的原始数据, 每个子目录一个类别
        #[arg(long)]
        src: PathBuf,

        /// 输出目录
        #[arg(long)]
        dst: PathBuf,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value_t = 350)]
        num_train: usize,

        #[arg(long, default_value_t = 150)]
        num_val: usize,
    },
    /// 合并 12 个单类数据集并生成 data.yaml
    Merge {
        /// split 的输出目录
        #[arg(long)]
        src: PathBuf,

        /// 合并后的数据集目录
        #[arg(long)]
        dst: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Split {
            src,
            dst,
            seed,
            num_train,
            num_val,
        } => {
            let options = SplitOptions {
                seed,
                num_train,
                num_val,
            };
            let reports = split_dataset(&src, &dst, &options)?;
            for r in &reports {
                log::info!("📊 {}: {} 组 → train {} / val {}", r.class, r.pairs, r.train, r.val);
            }
            log::info!("✅ 共处理 {} 个类别", reports.len());
        }
        Command::Merge { src, dst } => {
            let report = merge_datasets(&src, &dst, &DATASET_CLASSES)?;
            log::info!("📁 {}/train/images/", dst.display());
            log::info!("📁 {}/val/images/", dst.display());
            log::info!("📝 {}", report.manifest.display());
        }
    }
    Ok(())
}
