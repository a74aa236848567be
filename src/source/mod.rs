//! 图片来源
//!
//! 特征库只依赖 [`ImageSource`]：枚举 (id, 字节长度) 并按 id 解码出 RGB 像素

mod folder;
mod memory;

pub use folder::*;
pub use memory::*;

use std::path::PathBuf;

use image::RgbImage;

use crate::error::Result;

/// 图片目录中的一个条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub id: String,
    pub path: PathBuf,
    pub size: u64,
}

pub trait ImageSource {
    /// 枚举当前所有图片
    fn entries(&self) -> Result<Vec<ImageEntry>>;
    /// 解码图片，图片已消失时返回 [`Error::MissingFile`](crate::Error::MissingFile)
    fn decode(&self, entry: &ImageEntry) -> Result<RgbImage>;
    /// 图片是否仍然存在
    fn exists(&self, entry: &ImageEntry) -> bool;
}
