//! 图片特征提取
//!
//! 每张图片提取三组原始特征，按固定顺序排列：
//! 亮度直方图 (25) + 颜色编码直方图 (64) + 纹理 (3: energy, entropy, contrast)

mod histogram;
mod texture;

pub use histogram::*;
pub use texture::*;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const INTENSITY_BINS: usize = 25;
pub const COLOR_CODE_BINS: usize = 64;
pub const TEXTURE_DIMS: usize = 3;
pub const TOTAL_DIMS: usize = INTENSITY_BINS + COLOR_CODE_BINS + TEXTURE_DIMS;

/// 默认的共生矩阵位移
pub const DEFAULT_DISPLACEMENT: (isize, isize) = (1, 1);

/// 单张图片的原始特征向量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVectorSet {
    pub intensity: Vec<f64>,
    pub color_code: Vec<f64>,
    pub texture: Vec<f64>,
}

impl FeatureVectorSet {
    /// 从 92 维的扁平向量构造
    pub fn from_flat(flat: &[f64]) -> Result<Self> {
        if flat.len() != TOTAL_DIMS {
            return Err(Error::invalid(format!(
                "特征向量维数应为 {}，实际为 {}",
                TOTAL_DIMS,
                flat.len()
            )));
        }
        let (intensity, rest) = flat.split_at(INTENSITY_BINS);
        let (color_code, texture) = rest.split_at(COLOR_CODE_BINS);
        Ok(Self {
            intensity: intensity.to_vec(),
            color_code: color_code.to_vec(),
            texture: texture.to_vec(),
        })
    }

    /// 按固定顺序拼接为 92 维向量
    pub fn to_flat(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(TOTAL_DIMS);
        flat.extend_from_slice(&self.intensity);
        flat.extend_from_slice(&self.color_code);
        flat.extend_from_slice(&self.texture);
        flat
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.intensity.iter().chain(&self.color_code).chain(&self.texture).copied()
    }

    /// 各组维数是否正确
    pub fn is_well_formed(&self) -> bool {
        self.intensity.len() == INTENSITY_BINS
            && self.color_code.len() == COLOR_CODE_BINS
            && self.texture.len() == TEXTURE_DIMS
    }
}

/// 提取图片的全部原始特征
pub fn extract(image: &RgbImage, dr: isize, dc: isize) -> Result<FeatureVectorSet> {
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::invalid("图片不包含任何像素"));
    }
    Ok(FeatureVectorSet {
        intensity: intensity_histogram(image),
        color_code: color_code_histogram(image),
        texture: texture_features(image, dr, dc).to_vec(),
    })
}
