use std::collections::BTreeMap;

use image::RgbImage;

use super::{ImageEntry, ImageSource};
use crate::error::{Error, Result};

/// 内存中的图片集合，用于测试或嵌入其他程序
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    images: BTreeMap<String, (u64, RgbImage)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加或替换一张图片，`size` 充当文件字节长度
    pub fn insert(&mut self, id: impl Into<String>, size: u64, image: RgbImage) {
        self.images.insert(id.into(), (size, image));
    }

    pub fn remove(&mut self, id: &str) -> Option<RgbImage> {
        self.images.remove(id).map(|(_, image)| image)
    }
}

impl ImageSource for MemorySource {
    fn entries(&self) -> Result<Vec<ImageEntry>> {
        Ok(self
            .images
            .iter()
            .map(|(id, (size, _))| ImageEntry { id: id.clone(), path: id.into(), size: *size })
            .collect())
    }

    fn decode(&self, entry: &ImageEntry) -> Result<RgbImage> {
        self.images
            .get(&entry.id)
            .map(|(_, image)| image.clone())
            .ok_or_else(|| Error::MissingFile { id: entry.id.clone() })
    }

    fn exists(&self, entry: &ImageEntry) -> bool {
        self.images.contains_key(&entry.id)
    }
}
