//! 运行参数: 命令行 (clap) + 标定配置文件 (JSON)

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::labels::{Vocabulary, KNOWN_HEIGHTS_CM};

/// 测距策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceStrategy {
    /// 已知物体高度 × 焦距 ÷ 框高 (米)
    #[default]
    BoxHeight,
    /// 标定常数 ÷ 框中心深度值
    DepthInverse,
    /// 框中心的相对深度 (0-255)
    DepthRelative,
}

impl DistanceStrategy {
    pub fn needs_depth(&self) -> bool {
        !matches!(self, DistanceStrategy::BoxHeight)
    }
}

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "YOLO 目标检测 + MiDaS 单目深度测距", long_about = None)]
pub struct Args {
    /// 检测模型 ONNX 路径
    #[arg(long, required = true)]
    pub model: String,

    /// MiDaS 深度模型 ONNX 路径 (深度测距策略必需)
    #[arg(long)]
    pub depth_model: Option<String>,

    /// 输入源: 摄像头序号 / 设备名, 或图片文件 / 目录
    #[arg(long, default_value_t = String::from("0"))]
    pub source: String,

    /// 测距策略
    #[arg(long, value_enum, default_value_t = DistanceStrategy::BoxHeight)]
    pub strategy: DistanceStrategy,

    /// 置信度阈值 (覆盖配置文件)
    #[arg(long)]
    pub conf: Option<f32>,

    /// NMS IoU 阈值 (覆盖配置文件)
    #[arg(long)]
    pub iou: Option<f32>,

    /// 类别词表 (模型元数据中有 names 时以元数据为准)
    #[arg(long, value_enum)]
    pub vocabulary: Option<Vocabulary>,

    /// 类别数, 模型元数据缺失时使用
    #[arg(long)]
    pub nc: Option<usize>,

    /// 检测模型输入宽度 (动态输入时生效)
    #[arg(long)]
    pub width: Option<u32>,

    /// 检测模型输入高度 (动态输入时生效)
    #[arg(long)]
    pub height: Option<u32>,

    /// 深度模型输入边长 (动态输入时生效)
    #[arg(long)]
    pub depth_size: Option<u32>,

    /// 标定配置文件 (JSON), 默认位于用户配置目录
    #[arg(long)]
    pub config: Option<String>,

    /// 标签字体 (TTF/OTF)
    #[arg(long)]
    pub font: Option<String>,

    /// 摄像头分辨率
    #[arg(long, default_value_t = String::from("640x480"))]
    pub video_size: String,

    /// 摄像头帧率
    #[arg(long, default_value_t = 30)]
    pub framerate: u32,

    /// 标注结果输出目录 (annotate)
    #[arg(long)]
    pub output: Option<String>,

    /// 最多处理的帧数
    #[arg(long)]
    pub max_frames: Option<usize>,

    /// device id
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// using TensorRT EP
    #[arg(long)]
    pub trt: bool,

    /// using CUDA EP
    #[arg(long)]
    pub cuda: bool,

    /// using TensorRT EP FP16
    #[arg(long)]
    pub fp16: bool,

    /// profile
    #[arg(long)]
    pub profile: bool,
}

/// 标定与阈值配置, 通过 JSON 文件调整
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // === 检测参数 ===
    pub conf_threshold: f32, // 置信度阈值
    pub iou_threshold: f32,  // NMS IoU 阈值
    pub vocabulary: Vocabulary,

    // === 测距标定 ===
    pub focal_length_px: f32,         // 假定焦距 (像素)
    pub depth_calibration: f32,       // 深度反比例常数
    pub default_height_cm: f32,       // 未知类别的默认高度
    pub known_heights_cm: BTreeMap<String, f32>,

    // === 渲染 ===
    pub font_path: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            conf_threshold: 0.4,
            iou_threshold: 0.45,
            vocabulary: Vocabulary::Coco,

            focal_length_px: 700.0,
            depth_calibration: 1000.0,
            default_height_cm: 50.0,
            known_heights_cm: KNOWN_HEIGHTS_CM
                .entries()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),

            font_path: None,
        }
    }
}

impl PipelineConfig {
    /// 默认配置文件路径: <config_dir>/yolo-depth-rs/pipeline.json
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("yolo-depth-rs"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pipeline.json")
    }

    /// 从JSON文件加载配置, 文件不存在时写出默认配置
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    log::info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::error!("❌ 创建配置目录失败: {}", e);
                return;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    log::error!("❌ 保存配置失败: {}", e);
                } else {
                    log::info!("💾 配置已保存到 {}", path.display());
                }
            }
            Err(e) => log::error!("❌ 序列化配置失败: {}", e),
        }
    }

    /// 加载配置文件并叠加命令行覆盖项
    pub fn from_args(args: &Args) -> Self {
        let path = args
            .config
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_path);
        let mut config = Self::load(&path);
        config.apply_args(args);
        config
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(conf) = args.conf {
            self.conf_threshold = conf;
        }
        if let Some(iou) = args.iou {
            self.iou_threshold = iou;
        }
        if let Some(vocabulary) = args.vocabulary {
            self.vocabulary = vocabulary;
        }
        if let Some(font) = &args.font {
            self.font_path = Some(font.clone());
        }
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        log::info!(
            "🎛️  conf: {:.2}, iou: {:.2}, vocabulary: {:?}",
            self.conf_threshold,
            self.iou_threshold,
            self.vocabulary
        );
        log::info!(
            "📏 focal: {:.1}px, depth calibration: {:.1}, default height: {:.0}cm, {} known heights",
            self.focal_length_px,
            self.depth_calibration,
            self.default_height_cm,
            self.known_heights_cm.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["live", "--model", "yolov8n.onnx"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.focal_length_px, 700.0);
        assert_eq!(config.depth_calibration, 1000.0);
        assert_eq!(config.default_height_cm, 50.0);
        assert_eq!(config.known_heights_cm.get("person"), Some(&170.0));
        assert!(config.known_heights_cm.get("giraffe").is_none());
    }

    #[test]
    fn test_load_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pipeline.json");

        let first = PipelineConfig::load(&path);
        assert!(path.exists());
        assert_eq!(first, PipelineConfig::default());

        let mut edited = first.clone();
        edited.focal_length_px = 900.0;
        edited.known_heights_cm.insert("giraffe".into(), 500.0);
        edited.save(&path);

        let second = PipelineConfig::load(&path);
        assert_eq!(second.focal_length_px, 900.0);
        assert_eq!(second.known_heights_cm.get("giraffe"), Some(&500.0));
    }

    #[test]
    fn test_partial_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");

        fs::write(&path, r#"{ "depth_calibration": 250.0 }"#).unwrap();
        let partial = PipelineConfig::load(&path);
        assert_eq!(partial.depth_calibration, 250.0);
        assert_eq!(partial.conf_threshold, 0.4);

        fs::write(&path, "not json").unwrap();
        assert_eq!(PipelineConfig::load(&path), PipelineConfig::default());
    }

    #[test]
    fn test_cli_overrides() {
        let a = args(&["--conf", "0.5", "--iou", "0.4", "--vocabulary", "dataset"]);
        let mut config = PipelineConfig::default();
        config.apply_args(&a);
        assert_eq!(config.conf_threshold, 0.5);
        assert_eq!(config.iou_threshold, 0.4);
        assert_eq!(config.vocabulary, Vocabulary::Dataset);

        let b = args(&["--strategy", "depth-inverse"]);
        assert_eq!(b.strategy, DistanceStrategy::DepthInverse);
        assert!(b.strategy.needs_depth());
        assert!(!DistanceStrategy::BoxHeight.needs_depth());
    }
}
