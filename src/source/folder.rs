use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use image::{ImageError, RgbImage};
use log::{debug, warn};
use regex::Regex;
use walkdir::WalkDir;

use super::{ImageEntry, ImageSource};
use crate::error::{Error, Result};

pub const DEFAULT_SUFFIX: &str = "jpg,jpeg,png,bmp,gif";

/// 本地图片目录，只扫描第一层文件
#[derive(Debug, Clone)]
pub struct FolderSource {
    dir: PathBuf,
    re_suf: Regex,
}

impl FolderSource {
    /// # Arguments
    ///
    /// * `dir` - 图片目录
    /// * `suffix` - 扫描的文件后缀名，多个后缀用逗号分隔，不区分大小写
    pub fn new(dir: impl Into<PathBuf>, suffix: &str) -> Result<Self> {
        let re_suf = format!("(?i)^({})$", suffix.replace(',', "|"));
        let re_suf = Regex::new(&re_suf)
            .map_err(|e| Error::invalid(format!("无效的后缀列表 {}: {}", suffix, e)))?;
        Ok(Self { dir: dir.into(), re_suf })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn is_image(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| self.re_suf.is_match(&ext.to_string_lossy()))
    }
}

impl ImageSource for FolderSource {
    fn entries(&self) -> Result<Vec<ImageEntry>> {
        debug!("扫描图片目录: {}", self.dir.display());
        let mut entries = vec![];
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // 目录本身不可读时直接失败，单个条目出错则跳过
                    if e.depth() == 0 {
                        let source = e.into_io_error().unwrap_or_else(|| ErrorKind::Other.into());
                        return Err(Error::io(&self.dir, source));
                    }
                    warn!("跳过无法读取的条目: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || !self.is_image(path) {
                continue;
            }
            let size = match entry.metadata() {
                Ok(m) => m.len(),
                Err(e) => {
                    warn!("无法读取文件信息 {}: {}", path.display(), e);
                    continue;
                }
            };
            entries.push(ImageEntry {
                id: entry.file_name().to_string_lossy().to_string(),
                path: path.to_path_buf(),
                size,
            });
        }
        debug!("扫描完成，共 {} 张图片", entries.len());
        Ok(entries)
    }

    fn decode(&self, entry: &ImageEntry) -> Result<RgbImage> {
        match image::open(&entry.path) {
            Ok(img) => Ok(img.to_rgb8()),
            Err(ImageError::IoError(e)) if e.kind() == ErrorKind::NotFound => {
                Err(Error::MissingFile { id: entry.id.clone() })
            }
            Err(source) => Err(Error::Decode { path: entry.path.clone(), source }),
        }
    }

    /// 使用扫描时的原始路径，文件名不是合法 UTF-8 时 id 无法还原出路径
    fn exists(&self, entry: &ImageEntry) -> bool {
        entry.path.is_file()
    }
}
