//! data.yaml 生成 (YOLO 训练配置)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataManifest {
    pub path: PathBuf,
    pub train: String,
    pub val: String,
    pub nc: usize,
    /// 类别 ID → 类别名
    pub names: BTreeMap<usize, String>,
}

impl DataManifest {
    pub fn new(path: impl Into<PathBuf>, names: &[&str]) -> Self {
        Self {
            path: path.into(),
            train: "train/images".into(),
            val: "val/images".into(),
            nc: names.len(),
            names: names
                .iter()
                .enumerate()
                .map(|(id, name)| (id, name.to_string()))
                .collect(),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize data.yaml")
    }

    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let file = dir.join("data.yaml");
        fs::write(&file, self.to_yaml()?)
            .with_context(|| format!("Failed to write {}", file.display()))?;
        log::info!("📝 已生成 {} ({} 类)", file.display(), self.nc);
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_layout() {
        let m = DataManifest::new("/data/set", &["Bicycle", "Bus"]);
        assert_eq!(
            m.to_yaml().unwrap(),
            "path: /data/set\ntrain: train/images\nval: val/images\nnc: 2\nnames:\n  0: Bicycle\n  1: Bus\n"
        );
    }

    #[test]
    fn test_ambiguous_names_stay_strings() {
        let tricky = ["null", "yes", "No", "123", "a:", "a: b", "-x", "it's", "", "~"];
        let m = DataManifest::new("/data/set", &tricky);
        let yaml = m.to_yaml().unwrap();

        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let names = value["names"].as_mapping().unwrap();
        assert_eq!(names.len(), tricky.len());
        for (id, name) in tricky.iter().enumerate() {
            assert_eq!(value["names"][id].as_str(), Some(*name), "class {}", id);
        }
        assert_eq!(value["nc"].as_u64(), Some(tricky.len() as u64));

        let back: DataManifest = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let m = DataManifest::new(dir.path(), &["Person"]);
        let file = m.write(dir.path()).unwrap();
        assert_eq!(file, dir.path().join("data.yaml"));
        let back: DataManifest =
            serde_yaml::from_str(&fs::read_to_string(&file).unwrap()).unwrap();
        assert_eq!(back.names.get(&0).map(String::as_str), Some("Person"));
    }
}
