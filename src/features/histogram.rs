use image::{Rgb, RgbImage};

use super::{COLOR_CODE_BINS, INTENSITY_BINS};

/// 亮度直方图每个 bin 的宽度
const INTENSITY_BIN_WIDTH: u32 = 10;

/// 计算像素亮度 `0.299 R + 0.587 G + 0.114 B`
#[inline]
pub fn intensity(pixel: &Rgb<u8>) -> f64 {
    let [r, g, b] = pixel.0;
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// 像素的整数亮度等级 (0 ~ 255)
///
/// 三个系数之和在浮点下并不精确等于 1，灰色像素 (v, v, v) 的亮度可能是 v - 1e-14，
/// 取整前加上 1e-9 使其仍然落在等级 v 上
#[inline]
pub fn intensity_level(pixel: &Rgb<u8>) -> u8 {
    (intensity(pixel) + 1e-9).floor().min(255.0) as u8
}

/// 25 个 bin 的亮度直方图，按像素数量归一化
///
/// 亮度 >= 240 的像素全部落在最后一个 bin
pub fn intensity_histogram(image: &RgbImage) -> Vec<f64> {
    let mut hist = vec![0.0; INTENSITY_BINS];
    for pixel in image.pixels() {
        let bin = (intensity_level(pixel) as u32 / INTENSITY_BIN_WIDTH) as usize;
        hist[bin.min(INTENSITY_BINS - 1)] += 1.0;
    }
    normalize_by_pixels(&mut hist, image);
    hist
}

/// 像素的 6 位颜色编码：R、G、B 各取最高 2 位，按 RRGGBB 拼接
#[inline]
pub fn color_code(pixel: &Rgb<u8>) -> usize {
    let [r, g, b] = pixel.0;
    (((r >> 6) << 4) | ((g >> 6) << 2) | (b >> 6)) as usize
}

/// 64 个 bin 的颜色编码直方图，按像素数量归一化
pub fn color_code_histogram(image: &RgbImage) -> Vec<f64> {
    let mut hist = vec![0.0; COLOR_CODE_BINS];
    for pixel in image.pixels() {
        hist[color_code(pixel)] += 1.0;
    }
    normalize_by_pixels(&mut hist, image);
    hist
}

fn normalize_by_pixels(hist: &mut [f64], image: &RgbImage) {
    let total = image.width() as f64 * image.height() as f64;
    if total == 0.0 {
        return;
    }
    hist.iter_mut().for_each(|h| *h /= total);
}
