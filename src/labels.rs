//! 类别表 (COCO-80 / 自定义 12 类) 与已知物体高度表

use phf::phf_map;
use serde::{Deserialize, Serialize};

/// 越界类别 ID 的占位标签
pub const UNKNOWN_LABEL: &str = "Unknown";

/// COCO 80 类, 标准顺序
pub const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// 自建数据集的 12 类 (数据集合并时的类别 ID 顺序)
pub const DATASET_CLASSES: [&str; 12] = [
    "Bicycle",
    "Bus",
    "Car",
    "Chair",
    "Cow",
    "Dogs",
    "Motorcycle",
    "Person",
    "Stair",
    "Table",
    "Trash",
    "Truck",
];

/// 常见物体的典型高度 (cm), 用于框高测距
pub static KNOWN_HEIGHTS_CM: phf::Map<&'static str, f32> = phf_map! {
    "person" => 170.0,
    "bicycle" => 105.0,
    "car" => 150.0,
    "motorcycle" => 120.0,
    "bus" => 300.0,
    "truck" => 300.0,
    "cat" => 30.0,
    "dog" => 50.0,
    "bottle" => 25.0,
    "cup" => 10.0,
    "chair" => 100.0,
    "laptop" => 25.0,
    "cell phone" => 15.0,
    "book" => 20.0,
};

/// 内置词表选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Vocabulary {
    #[default]
    Coco,
    Dataset,
}

/// 封闭、有序的类别表
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
    names: Vec<String>,
}

impl LabelTable {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn coco() -> Self {
        Self::from_static(&COCO_CLASSES)
    }

    pub fn dataset() -> Self {
        Self::from_static(&DATASET_CLASSES)
    }

    pub fn from_vocabulary(vocabulary: Vocabulary) -> Self {
        match vocabulary {
            Vocabulary::Coco => Self::coco(),
            Vocabulary::Dataset => Self::dataset(),
        }
    }

    fn from_static(names: &[&str]) -> Self {
        Self::new(names.iter().map(|s| s.to_string()).collect())
    }

    /// 类别 ID → 名称, 越界返回 "Unknown"
    pub fn name(&self, class_id: usize) -> &str {
        self.names
            .get(class_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LABEL)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::coco()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_falls_back() {
        let coco = LabelTable::coco();
        assert_eq!(coco.len(), 80);
        assert_eq!(coco.name(0), "person");
        assert_eq!(coco.name(79), "toothbrush");
        assert_eq!(coco.name(80), UNKNOWN_LABEL);
        assert_eq!(coco.name(usize::MAX), UNKNOWN_LABEL);

        let dataset = LabelTable::dataset();
        assert_eq!(dataset.name(7), "Person");
        assert_eq!(dataset.name(12), UNKNOWN_LABEL);

        assert_eq!(LabelTable::new(Vec::new()).name(0), UNKNOWN_LABEL);
    }

    #[test]
    fn test_known_heights() {
        assert_eq!(KNOWN_HEIGHTS_CM.get("person"), Some(&170.0));
        assert_eq!(KNOWN_HEIGHTS_CM.get("cell phone"), Some(&15.0));
        assert!(KNOWN_HEIGHTS_CM.get("giraffe").is_none());
    }
}
