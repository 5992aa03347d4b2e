//! 单类数据集合并为统一的 YOLO 数据集
//!
//! `{src}/{Class}/{split}/images/x.jpg` → `{dst}/{split}/images/{slug}_x.jpg`,
//! 标注每行首个字段改写为该类别在词表中的 id。

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::{file_stem, has_extension, slugify, DataManifest, SPLITS};

/// 合并时识别的图片格式
const MERGE_IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "png", "jpeg", "webp", "bmp", "tif", "tiff"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub images: usize,
    pub labels: usize,
    pub missing_labels: usize,
    pub manifest: PathBuf,
}

/// 把标注每个非空行的类别字段替换为 `class_id`, 行间用 `\n` 连接
pub fn rewrite_label(content: &str, class_id: usize) -> String {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            parts.next()?;
            let rest: Vec<&str> = parts.collect();
            if rest.is_empty() {
                Some(class_id.to_string())
            } else {
                Some(format!("{} {}", class_id, rest.join(" ")))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 按词表顺序合并, 缺失的类别或划分目录会被跳过
pub fn merge_datasets(src: &Path, dst: &Path, classes: &[&str]) -> Result<MergeReport> {
    for split in SPLITS {
        fs::create_dir_all(dst.join(split).join("images"))?;
        fs::create_dir_all(dst.join(split).join("labels"))?;
    }

    let mut report = MergeReport::default();

    for (class_id, class) in classes.iter().enumerate() {
        let slug = slugify(class);
        log::info!("📦 处理 {}...", class);

        for split in SPLITS {
            let img_dir = src.join(class).join(split).join("images");
            let lbl_dir = src.join(class).join(split).join("labels");

            if !img_dir.is_dir() {
                log::info!("  跳过 {} (目录不存在)", split);
                continue;
            }

            let mut files: Vec<PathBuf> = fs::read_dir(&img_dir)
                .with_context(|| format!("Failed to read {}", img_dir.display()))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && has_extension(p, &MERGE_IMAGE_EXTENSIONS))
                .collect();
            files.sort();
            log::info!("  {}: {} 张图片", split, files.len());

            for img in files {
                let Some(name) = file_stem(&img) else {
                    continue;
                };
                let ext = img
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_default();
                let new_name = format!("{}_{}", slug, name);

                let dst_img = dst.join(split).join("images").join(format!("{}{}", new_name, ext));
                fs::copy(&img, &dst_img)
                    .with_context(|| format!("Failed to copy {}", img.display()))?;
                report.images += 1;
                log::debug!("    已复制: {}{}", new_name, ext);

                let src_lbl = lbl_dir.join(format!("{}.txt", name));
                if src_lbl.exists() {
                    let content = fs::read_to_string(&src_lbl)
                        .with_context(|| format!("Failed to read {}", src_lbl.display()))?;
                    let dst_lbl = dst.join(split).join("labels").join(format!("{}.txt", new_name));
                    fs::write(&dst_lbl, rewrite_label(&content, class_id))?;
                    report.labels += 1;
                } else {
                    log::warn!("⚠️ 缺少标注: {}{}", new_name, ext);
                    report.missing_labels += 1;
                }
            }
        }
    }

    let root = fs::canonicalize(dst).unwrap_or_else(|_| dst.to_path_buf());
    report.manifest = DataManifest::new(root, classes).write(dst)?;

    log::info!(
        "✅ 合并完成: {} 张图片, {} 个标注, {} 个缺失",
        report.images,
        report.labels,
        report.missing_labels
    );
    Ok(report)
}
