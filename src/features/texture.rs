use std::collections::BTreeMap;

use image::RgbImage;
use ndarray::{Array2, ArrayView2};

use super::histogram::intensity_level;

/// 稀疏的共生矩阵，只包含图片中真实出现过的亮度值
///
/// `matrix[i][j]` 表示亮度 i 的像素在位移 (dr, dc) 处出现亮度 j 的次数（或概率）
pub type CoOccurrence = BTreeMap<u8, BTreeMap<u8, f64>>;

/// 纹理特征三元组：能量、熵、对比度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Texture {
    pub energy: f64,
    pub entropy: f64,
    pub contrast: f64,
}

impl Texture {
    pub fn to_vec(self) -> Vec<f64> {
        vec![self.energy, self.entropy, self.contrast]
    }
}

/// 将图片转换为整数亮度矩阵，形状为 (高, 宽)
pub fn intensity_matrix(image: &RgbImage) -> Array2<u8> {
    let (width, height) = image.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
        intensity_level(image.get_pixel(c as u32, r as u32))
    })
}

/// 计算位移为 (dr, dc) 的共生矩阵
///
/// 超出边界的像素对直接跳过，不做环绕
pub fn co_occurrence(matrix: &ArrayView2<u8>, dr: isize, dc: isize) -> CoOccurrence {
    let (rows, cols) = matrix.dim();
    let mut counts = CoOccurrence::new();

    let row_range = shifted_range(rows, dr);
    let col_range = shifted_range(cols, dc);

    for r in row_range {
        for c in col_range.clone() {
            let from = matrix[[r, c]];
            let to = matrix[[(r as isize + dr) as usize, (c as isize + dc) as usize]];
            *counts.entry(from).or_default().entry(to).or_insert(0.0) += 1.0;
        }
    }

    counts
}

/// 满足 `0 <= i + d < len` 的 i 的范围
fn shifted_range(len: usize, d: isize) -> std::ops::Range<usize> {
    let len = len as isize;
    let start = (-d).clamp(0, len);
    let end = (len - d).clamp(0, len);
    start as usize..end.max(start) as usize
}

/// 将共生矩阵归一化为联合概率分布（灰度共生矩阵）
pub fn gray_tone(co_occurrence: &CoOccurrence) -> CoOccurrence {
    let total: f64 = co_occurrence.values().flat_map(|row| row.values()).sum();
    if total == 0.0 {
        return CoOccurrence::new();
    }
    co_occurrence
        .iter()
        .map(|(&i, row)| (i, row.iter().map(|(&j, &n)| (j, n / total)).collect()))
        .collect()
}

fn cells(gray_tone: &CoOccurrence) -> impl Iterator<Item = (u8, u8, f64)> + '_ {
    gray_tone.iter().flat_map(|(&i, row)| row.iter().map(move |(&j, &p)| (i, j, p)))
}

/// 能量 `Σ p²`
pub fn energy(gray_tone: &CoOccurrence) -> f64 {
    cells(gray_tone).map(|(_, _, p)| p * p).sum()
}

/// 熵 `Σ p·log2(p)`
///
/// 注意这里没有取负号，结果为非正数
pub fn entropy(gray_tone: &CoOccurrence) -> f64 {
    cells(gray_tone).filter(|&(_, _, p)| p > 0.0).map(|(_, _, p)| p * p.log2()).sum()
}

/// 对比度 `Σ (i - j)² · p(i, j)`
pub fn contrast(gray_tone: &CoOccurrence) -> f64 {
    cells(gray_tone)
        .map(|(i, j, p)| {
            let d = i as f64 - j as f64;
            d * d * p
        })
        .sum()
}

/// 计算亮度矩阵的纹理特征
pub fn texture_of(matrix: &ArrayView2<u8>, dr: isize, dc: isize) -> Texture {
    let gray = gray_tone(&co_occurrence(matrix, dr, dc));
    Texture { energy: energy(&gray), entropy: entropy(&gray), contrast: contrast(&gray) }
}

/// 计算图片的纹理特征 (energy, entropy, contrast)
pub fn texture_features(image: &RgbImage, dr: isize, dc: isize) -> Texture {
    texture_of(&intensity_matrix(image).view(), dr, dc)
}
