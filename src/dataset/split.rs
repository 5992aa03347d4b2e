//! 原始单类数据 → train / val 划分
//!
//! 输入目录下每个子目录是一个类别 (已解压的导出包), 递归查找图片与同名 txt 标注,
//! 只保留配对成功的样本。

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{file_stem, has_extension, is_ignored_label};

/// 划分时识别的图片格式
const SPLIT_IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitOptions {
    pub seed: u64,
    pub num_train: usize,
    pub num_val: usize,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            num_train: 350,
            num_val: 150,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitReport {
    pub class: String,
    pub pairs: usize,
    pub train: usize,
    pub val: usize,
}

/// (图片, 标注) 配对, 图片按路径排序
pub fn collect_pairs(dir: &Path) -> Vec<(PathBuf, PathBuf)> {
    let mut images = Vec::new();
    let mut labels: HashMap<String, PathBuf> = HashMap::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.into_path();
        if has_extension(&path, &SPLIT_IMAGE_EXTENSIONS) {
            images.push(path);
        } else if has_extension(&path, &["txt"]) {
            if let Some(stem) = file_stem(&path) {
                if !is_ignored_label(&stem) {
                    labels.insert(stem, path);
                }
            }
        }
    }
    images.sort();

    images
        .into_iter()
        .filter_map(|img| {
            let label = labels.get(&file_stem(&img)?)?.clone();
            Some((img, label))
        })
        .collect()
}

/// 按类别划分; 所有类别共用一个随机数生成器, 类别按目录名顺序处理
pub fn split_dataset(src: &Path, dst: &Path, options: &SplitOptions) -> Result<Vec<SplitReport>> {
    let mut classes: Vec<PathBuf> = fs::read_dir(src)
        .with_context(|| format!("Failed to read {}", src.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    classes.sort();

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut reports = Vec::with_capacity(classes.len());

    for class_dir in classes {
        let Some(class) = file_stem(&class_dir) else {
            continue;
        };
        log::info!("📦 处理 {}...", class);

        let mut pairs = collect_pairs(&class_dir);
        pairs.shuffle(&mut rng);

        let train_end = options.num_train.min(pairs.len());
        let val_end = (train_end + options.num_val).min(pairs.len());
        let (train, val) = (&pairs[..train_end], &pairs[train_end..val_end]);

        log::info!("  有效配对 {} 组, train {}, val {}", pairs.len(), train.len(), val.len());

        let out = dst.join(&class);
        place_pairs(train, &out.join("train"))?;
        place_pairs(val, &out.join("val"))?;

        reports.push(SplitReport {
            class,
            pairs: pairs.len(),
            train: train.len(),
            val: val.len(),
        });
    }
    Ok(reports)
}

fn place_pairs(pairs: &[(PathBuf, PathBuf)], split_dir: &Path) -> Result<()> {
    let img_dir = split_dir.join("images");
    let lbl_dir = split_dir.join("labels");
    fs::create_dir_all(&img_dir)?;
    fs::create_dir_all(&lbl_dir)?;

    for (img, lbl) in pairs {
        for (src, dir) in [(img, &img_dir), (lbl, &lbl_dir)] {
            let Some(name) = src.file_name() else {
                continue;
            };
            fs::copy(src, dir.join(name))
                .with_context(|| format!("Failed to copy {}", src.display()))?;
        }
    }
    Ok(())
}
