//! 图片输入: 单张图片或目录 (非递归, 按文件名排序)

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{Frame, FrameSource};

pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "webp", "bmp", "tif", "tiff"];

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub struct ImageSource {
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSource {
    pub fn open(source: impl AsRef<Path>) -> Result<Self> {
        let source = source.as_ref();
        let paths = if source.is_dir() {
            let mut paths: Vec<PathBuf> = WalkDir::new(source)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            paths.sort();
            paths
        } else if source.is_file() {
            vec![source.to_path_buf()]
        } else {
            bail!("Image source not found: {}", source.display());
        };

        log::info!("🖼️ 图片输入: {} ({} 张)", source.display(), paths.len());
        Ok(Self::from_paths(paths))
    }

    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self { paths, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// 当前 (最近一次读取) 帧对应的文件
    pub fn current_path(&self) -> Option<&Path> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.paths.get(i))
            .map(PathBuf::as_path)
    }
}

impl FrameSource for ImageSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        let image = image::open(path)
            .with_context(|| format!("Failed to read frame {}", path.display()))?
            .to_rgb8();
        let id = self.cursor as u64;
        self.cursor += 1;
        Ok(Some(Frame { id, image }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_directory_source_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::new(4, 3).save(dir.path().join("b.png")).unwrap();
        RgbImage::new(8, 6).save(dir.path().join("a.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

        let mut src = ImageSource::open(dir.path()).unwrap();
        assert_eq!(src.len(), 2);

        let first = src.next_frame().unwrap().unwrap();
        assert_eq!(first.id, 0);
        assert_eq!(first.image.dimensions(), (8, 6));
        assert!(src.current_path().unwrap().ends_with("a.png"));

        let second = src.next_frame().unwrap().unwrap();
        assert_eq!(second.id, 1);
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_unreadable_frame_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("broken.jpg");
        std::fs::write(&bad, "not an image").unwrap();
        let mut src = ImageSource::open(&bad).unwrap();
        assert!(src.next_frame().is_err());
        assert!(ImageSource::open(dir.path().join("missing.png")).is_err());
    }

    #[test]
    fn test_is_image() {
        assert!(is_image(Path::new("a/B.JPG")));
        assert!(is_image(Path::new("x.tiff")));
        assert!(!is_image(Path::new("labels/x.txt")));
        assert!(!is_image(Path::new("noext")));
    }
}
