//! 相关反馈权重调整
//!
//! 根据用户标记为相关的图片重新计算每一维特征的权重：
//! 相关图片在某一维上越一致（标准差越小），该维的权重越高

use log::{debug, warn};
use ndarray::{Array2, Axis};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::mask::FeatureMask;
use crate::record::RecordSet;
use crate::store::FeatureStore;
use crate::utils::{is_zero, snap_zero};

/// 组合特征每一维的权重
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightVector(Vec<f64>);

impl WeightVector {
    /// 每一维权重均为 `1 / len`
    pub fn uniform(len: usize) -> Self {
        Self(vec![1.0 / len.max(1) as f64; len])
    }

    /// 每一维权重均为 1，即不加权的 Minkowski 距离
    pub fn ones(len: usize) -> Self {
        Self(vec![1.0; len])
    }

    pub fn from_vec(weights: Vec<f64>) -> Self {
        Self(weights)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }
}

/// 第一轮计算的结果
#[derive(Debug, Clone, Copy, PartialEq)]
enum DimWeight {
    Definite(f64),
    /// 所有维度的标准差都为 0，暂时无法确定
    Unresolved,
}

/// 根据相关图片重新计算权重
///
/// 查询图片总是被视为相关。相关图片少于两张时无法计算方差，原样返回 `current`。
///
/// # Arguments
///
/// * `query_id` - 查询图片
/// * `mask` - 特征选择掩码
/// * `records` - 带有相关标记的图片记录
/// * `store` - 特征库，使用其中的原始特征
/// * `current` - 当前权重
pub fn adjust_weights(
    query_id: &str,
    mask: &FeatureMask,
    records: &RecordSet,
    store: &FeatureStore,
    current: &WeightVector,
) -> Result<WeightVector> {
    if current.len() != mask.len() {
        return Err(Error::invalid(format!(
            "权重维数 {} 与特征维数 {} 不一致",
            current.len(),
            mask.len()
        )));
    }
    if !store.contains(query_id) {
        return Err(Error::invalid(format!("查询图片不在特征库中: {}", query_id)));
    }

    let mut relevant = vec![query_id];
    for id in records.relevant_ids() {
        if id == query_id {
            continue;
        }
        if store.contains(id) {
            relevant.push(id);
        } else {
            warn!("{}，不参与权重计算", Error::MissingFile { id: id.to_owned() });
        }
    }

    if relevant.len() < 2 {
        debug!("相关图片不足两张，保持原有权重");
        return Ok(current.clone());
    }

    let mut matrix = Array2::zeros((relevant.len(), mask.len()));
    for (mut row, id) in matrix.axis_iter_mut(Axis(0)).zip(&relevant) {
        let features = store
            .raw_features(id, mask)
            .ok_or_else(|| Error::MissingFile { id: (*id).to_owned() })?;
        row.assign(&ndarray::ArrayView1::from(&features));
    }

    let mean = matrix
        .mean_axis(Axis(0))
        .ok_or_else(|| Error::invalid("相关图片矩阵为空"))?;
    let sigma = matrix.std_axis(Axis(0), 1.0);

    let weights = weights_from_stats(mean.as_slice().unwrap_or(&[]), sigma.as_slice().unwrap_or(&[]));
    debug!(
        "根据 {} 张相关图片更新权重，非零维度 {} / {}",
        relevant.len(),
        weights.iter().filter(|w| **w != 0.0).count(),
        weights.len()
    );
    Ok(WeightVector(weights))
}

/// 由相关图片每一维的均值和标准差计算归一化后的权重
fn weights_from_stats(mean: &[f64], sigma: &[f64]) -> Vec<f64> {
    let min_sigma = sigma.iter().copied().filter(|s| !is_zero(*s)).reduce(f64::min);

    // 第一轮：确定的权重
    let pass1 = mean
        .iter()
        .zip(sigma)
        .map(|(&m, &s)| {
            if is_zero(m) {
                DimWeight::Definite(0.0)
            } else if is_zero(s) {
                match min_sigma {
                    Some(min) => DimWeight::Definite(1.0 / (min / 2.0)),
                    None => DimWeight::Unresolved,
                }
            } else {
                DimWeight::Definite(1.0 / s)
            }
        })
        .collect::<Vec<_>>();

    // 第二轮：未确定的维度取第一轮的最大权重
    let max = pass1
        .iter()
        .filter_map(|w| match w {
            DimWeight::Definite(w) => Some(*w),
            DimWeight::Unresolved => None,
        })
        .reduce(f64::max)
        .unwrap_or(0.0);

    let mut weights = pass1
        .into_iter()
        .map(|w| match w {
            DimWeight::Definite(w) => snap_zero(w),
            DimWeight::Unresolved => snap_zero(max),
        })
        .collect::<Vec<_>>();

    let sum: f64 = weights.iter().sum();
    if sum != 0.0 {
        weights.iter_mut().for_each(|w| *w /= sum);
    }
    weights
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;
    use crate::mask::FeatureGroup;
    use crate::source::MemorySource;
    use crate::store::{MemoryBackend, SyncOptions};

    const TOLERANCE: f64 = 1e-9;

    fn corpus(images: &[(&str, RgbImage)]) -> (FeatureStore, RecordSet) {
        let mut source = MemorySource::new();
        for (i, (id, image)) in images.iter().enumerate() {
            source.insert(*id, i as u64 + 1, image.clone());
        }
        let mut store = FeatureStore::new();
        let mut records = RecordSet::new();
        store
            .synchronize(&source, &mut MemoryBackend::new(), &mut records, &SyncOptions::default())
            .unwrap();
        (store, records)
    }

    fn gradient(seed: u32) -> RgbImage {
        RgbImage::from_fn(8, 8, |x, y| {
            Rgb([(x * 30 + seed) as u8, (y * 25 + seed * 2) as u8, ((x + y) * 10 + seed) as u8])
        })
    }

    #[test]
    fn fewer_than_two_relevant_keeps_weights() {
        let (store, records) = corpus(&[("a", gradient(0)), ("b", gradient(40))]);
        let mask = FeatureMask::all();
        let current = WeightVector::from_vec((0..mask.len()).map(|i| i as f64).collect());
        let adjusted = adjust_weights("a", &mask, &records, &store, &current).unwrap();
        assert_eq!(adjusted, current);
    }

    #[test]
    fn query_marked_relevant_counts_once() {
        let (store, mut records) = corpus(&[("a", gradient(0)), ("b", gradient(40))]);
        records.mark_relevant("a", true);
        let mask = FeatureMask::all();
        let current = WeightVector::uniform(mask.len());
        assert_eq!(adjust_weights("a", &mask, &records, &store, &current).unwrap(), current);
    }

    #[test]
    fn two_relevant_images() {
        let (store, mut records) =
            corpus(&[("a", gradient(0)), ("b", gradient(40)), ("c", gradient(90))]);
        records.mark_relevant("b", true);
        let mask = FeatureMask::all();
        let weights =
            adjust_weights("a", &mask, &records, &store, &WeightVector::uniform(mask.len()))
                .unwrap();
        assert_eq!(weights.len(), mask.len());
        assert!(weights.as_slice().iter().all(|w| *w >= 0.0));
        assert!((weights.sum() - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn intensity_mask_scenario() {
        let (store, mut records) =
            corpus(&[("a", gradient(0)), ("b", gradient(5)), ("c", gradient(200))]);
        records.mark_relevant("b", true);
        let mask = FeatureMask::only(FeatureGroup::Intensity);
        let weights =
            adjust_weights("a", &mask, &records, &store, &WeightVector::uniform(mask.len()))
                .unwrap();
        assert_eq!(weights.len(), 25);
        assert!((weights.sum() - 1.0).abs() < TOLERANCE);
        // 两张图片中都为空的 bin 不携带信息
        let a = store.raw_features("a", &mask).unwrap();
        let b = store.raw_features("b", &mask).unwrap();
        for i in 0..25 {
            if a[i] == 0.0 && b[i] == 0.0 {
                assert_eq!(weights.as_slice()[i], 0.0);
            }
        }
    }

    #[test]
    fn identical_relevant_images_give_zero_weights() {
        // 所有维度标准差都为 0，占位维度取第一轮最大值 0，总和为 0 时保持不变
        let (store, mut records) = corpus(&[("a", gradient(7)), ("b", gradient(7))]);
        records.mark_relevant("b", true);
        let mask = FeatureMask::only(FeatureGroup::Intensity);
        let weights =
            adjust_weights("a", &mask, &records, &store, &WeightVector::uniform(mask.len()))
                .unwrap();
        assert!(weights.as_slice().iter().all(|w| *w == 0.0));
    }

    #[test]
    fn unknown_relevant_ids_are_skipped() {
        let (store, mut records) = corpus(&[("a", gradient(0)), ("b", gradient(40))]);
        records.insert(crate::ImageRecord::new("ghost", "ghost", 1));
        records.mark_relevant("ghost", true);
        let mask = FeatureMask::all();
        let current = WeightVector::uniform(mask.len());
        assert_eq!(adjust_weights("a", &mask, &records, &store, &current).unwrap(), current);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let (store, records) = corpus(&[("a", gradient(0))]);
        let mask = FeatureMask::all();
        let err = adjust_weights("a", &mask, &records, &store, &WeightVector::ones(3)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn inverse_sigma_weights() {
        let w = weights_from_stats(&[1.0, 1.0], &[1.0, 0.5]);
        assert!((w[0] - 1.0 / 3.0).abs() < TOLERANCE);
        assert!((w[1] - 2.0 / 3.0).abs() < TOLERANCE);
    }

    #[test]
    fn zero_mean_dimension_gets_no_weight() {
        let w = weights_from_stats(&[0.0, 2.0], &[0.3, 0.5]);
        assert_eq!(w, vec![0.0, 1.0]);
    }

    #[test]
    fn zero_sigma_uses_half_of_smallest_sigma() {
        // 第 0 维：1 / (0.25 / 2) = 8；第 1 维：1 / 0.25 = 4；第 2 维：1 / 0.5 = 2
        let w = weights_from_stats(&[1.0, 1.0, 1.0], &[0.0, 0.25, 0.5]);
        assert!((w[0] - 8.0 / 14.0).abs() < TOLERANCE);
        assert!((w[1] - 4.0 / 14.0).abs() < TOLERANCE);
        assert!((w[2] - 2.0 / 14.0).abs() < TOLERANCE);
    }

    #[test]
    fn unresolved_dimensions_take_max_weight() {
        let w = weights_from_stats(&[1.0, 2.0, 0.0], &[0.0, 0.0, 0.0]);
        assert_eq!(w, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn all_zero_sum_is_left_as_is() {
        let w = weights_from_stats(&[0.0, 0.0], &[0.0, 0.0]);
        assert_eq!(w, vec![0.0, 0.0]);
    }
}
