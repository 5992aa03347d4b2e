/// 数据集整理 (Dataset Utilities)
///
/// - split:    每类原始数据 (已解压) → 按文件名配对 → 固定种子打乱 → train / val
/// - merge:    多个单类数据集 → 统一 YOLO 目录 + 类别 id 重写
/// - manifest: 生成 data.yaml
pub mod manifest;
pub mod merge;
pub mod split;

pub use manifest::DataManifest;
pub use merge::{merge_datasets, MergeReport};
pub use split::{split_dataset, SplitOptions, SplitReport};

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// 训练 / 验证划分目录名
pub const SPLITS: [&str; 2] = ["train", "val"];

/// Roboflow 导出包里附带的非标注 txt
const IGNORED_LABEL_STEMS: [&str; 4] = ["readme.roboflow", "readme", "classes", "_darknet.labels"];

static SLUG_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[ -]").ok());

/// 类别名 → 文件名前缀: 小写, 空格与连字符替换为下划线
pub fn slugify(name: &str) -> String {
    let lower = name.to_lowercase();
    match SLUG_RE.as_ref() {
        Some(re) => re.replace_all(&lower, "_").into_owned(),
        None => lower.replace([' ', '-'], "_"),
    }
}

/// 文件名 (不含扩展名)
pub(crate) fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

/// 扩展名是否在列表中 (不区分大小写)
pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

pub(crate) fn is_ignored_label(stem: &str) -> bool {
    IGNORED_LABEL_STEMS.contains(&stem.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Person"), "person");
        assert_eq!(slugify("Traffic Light"), "traffic_light");
        assert_eq!(slugify("Fire-Hydrant x"), "fire_hydrant_x");
    }

    #[test]
    fn test_ignored_labels() {
        assert!(is_ignored_label("README.roboflow"));
        assert!(is_ignored_label("classes"));
        assert!(!is_ignored_label("img_001"));
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension(Path::new("a.JPG"), &["jpg"]));
        assert!(!has_extension(Path::new("a.gif"), &["jpg", "png"]));
    }
}
