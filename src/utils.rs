use std::path::Path;
use std::time::{Duration, Instant};

use indicatif::ProgressStyle;

use crate::error::{Error, Result};

/// 全局统一的浮点噪声阈值
///
/// 所有“接近零则视为零”的判断都使用这个值：
/// - 归一化时的标准差 / 取值范围下限
/// - 相关反馈中均值、标准差的零判断
/// - 最终权重的截断
pub const EPSILON: f64 = 1e-10;

/// 绝对值小于 [`EPSILON`] 的数截断为 0
#[inline]
pub fn snap_zero(x: f64) -> f64 {
    if x.abs() < EPSILON { 0.0 } else { x }
}

#[inline]
pub fn is_zero(x: f64) -> bool {
    x.abs() < EPSILON
}

/// NaN、无穷大以及 f64::MAX 这样的哨兵值都视为损坏
#[inline]
pub fn is_corrupted(x: f64) -> bool {
    !x.is_finite() || x.abs() >= f64::MAX
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .expect("invalid progress bar template")
        .progress_chars("#>-")
}

/// 返回文件字节长度
pub fn file_size(path: impl AsRef<Path>) -> Result<u64> {
    let path = path.as_ref();
    std::fs::metadata(path).map(|m| m.len()).map_err(|e| Error::io(path, e))
}

/// 记录一段代码的耗时
pub fn measure<F, R>(f: F) -> (R, Duration)
where
    F: FnOnce() -> R,
{
    let start = Instant::now();
    let r = f();
    (r, start.elapsed())
}
