//! 特征库
//!
//! 原始特征是唯一的权威数据，会被持久化；归一化只作用于内存中的视图，
//! 每次会话重新计算，不会写回存储

mod backend;
mod stats;
mod sync;

pub use backend::*;
pub use stats::*;
pub use sync::*;

use std::collections::BTreeMap;

use log::{debug, info};
use ndarray::Array2;

use crate::error::{Error, Result};
use crate::features::{self, FeatureVectorSet, TOTAL_DIMS};
use crate::mask::FeatureMask;
use crate::source::{ImageEntry, ImageSource};
use crate::utils::is_corrupted;

/// 特征库文件名
pub const STORE_FILE: &str = "imrank.db";

#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    raw: RawDatabase,
    stats: Option<CorpusStats>,
    /// 归一化后的特征，未归一化时为空
    view: BTreeMap<String, FeatureVectorSet>,
}

impl FeatureStore {
    /// 创建空的特征库
    pub fn new() -> Self {
        Self::default()
    }

    /// 从后端加载特征库，不存在时返回空库
    pub fn load(backend: &dyn Backend) -> Result<Self> {
        let Some(blob) = backend.read()? else {
            debug!("特征库不存在，创建空库");
            return Ok(Self::new());
        };
        let store = Self { raw: decode(&blob)?, ..Self::default() };
        store.check_data()?;
        info!("加载特征库，共 {} 张图片", store.len());
        Ok(store)
    }

    /// 保存原始特征到后端
    pub fn save(&self, backend: &mut dyn Backend) -> Result<()> {
        self.check_raw()?;
        backend.write(&encode(&self.raw)?)?;
        debug!("特征库已保存，共 {} 张图片", self.len());
        Ok(())
    }

    pub fn raw(&self) -> &RawDatabase {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.features.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.raw.features.contains_key(id)
    }

    pub fn size_of(&self, id: &str) -> Option<u64> {
        self.raw.sizes.get(id).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.raw.features.keys().map(String::as_str)
    }

    /// 当前的归一化方式
    pub fn normalization(&self) -> Normalization {
        self.stats.as_ref().map_or(Normalization::None, CorpusStats::mode)
    }

    pub fn is_normalized(&self) -> bool {
        self.stats.is_some()
    }

    pub fn stats(&self) -> Option<&CorpusStats> {
        self.stats.as_ref()
    }

    /// 库中纹理特征使用的共生矩阵位移
    pub fn displacement(&self) -> (isize, isize) {
        self.raw.displacement
    }

    /// 修改共生矩阵位移，库中已有的特征全部作废，返回被丢弃的图片
    pub fn reset_displacement(&mut self, displacement: (isize, isize)) -> Vec<String> {
        if self.raw.displacement == displacement {
            return Vec::new();
        }
        info!(
            "共生矩阵位移由 {:?} 改为 {:?}，丢弃 {} 张图片的特征",
            self.raw.displacement,
            displacement,
            self.len()
        );
        let dropped = self.ids().map(str::to_owned).collect();
        self.clear();
        self.raw.displacement = displacement;
        dropped
    }

    /// 添加一条已提取的原始特征
    pub fn insert(&mut self, id: &str, size: u64, features: FeatureVectorSet) -> Result<()> {
        if self.is_normalized() {
            return Err(Error::NormalizationGuard(format!(
                "特征库已归一化，不能再添加图片 {}，请重新加载特征库",
                id
            )));
        }
        if !features.is_well_formed() {
            return Err(Error::invalid(format!("图片 {} 的特征维数不正确", id)));
        }
        self.raw.sizes.insert(id.to_owned(), size);
        self.raw.features.insert(id.to_owned(), features);
        Ok(())
    }

    /// 提取图片特征并添加到特征库
    ///
    /// # Arguments
    ///
    /// * `source` - 图片来源
    /// * `entry` - 图片条目 (id, 路径, 字节长度)
    /// * `dr`, `dc` - 共生矩阵位移
    pub fn add_image(
        &mut self,
        source: &dyn ImageSource,
        entry: &ImageEntry,
        dr: isize,
        dc: isize,
    ) -> Result<()> {
        if self.is_normalized() {
            return Err(Error::NormalizationGuard(format!(
                "特征库已归一化，不能再添加图片 {}，请重新加载特征库",
                entry.id
            )));
        }
        if (dr, dc) != self.raw.displacement {
            if !self.is_empty() {
                return Err(Error::invalid(format!(
                    "特征库使用的共生矩阵位移为 {:?}，不能使用 {:?} 添加图片 {}",
                    self.raw.displacement,
                    (dr, dc),
                    entry.id
                )));
            }
            self.raw.displacement = (dr, dc);
        }
        let image = source.decode(entry)?;
        let features = features::extract(&image, dr, dc)?;
        self.insert(&entry.id, entry.size, features)
    }

    /// 删除一张图片，返回其是否存在
    ///
    /// 归一化视图依赖全库统计量，删除后统计量和视图一并作废，需要重新归一化
    pub fn remove(&mut self, id: &str) -> bool {
        self.raw.sizes.remove(id);
        let removed = self.raw.features.remove(id).is_some();
        if removed && self.stats.take().is_some() {
            debug!("删除图片 {} 后归一化视图失效", id);
            self.view.clear();
        }
        removed
    }

    /// 清空特征库，同时丢弃归一化状态
    pub fn clear(&mut self) {
        self.raw = RawDatabase::default();
        self.stats = None;
        self.view.clear();
    }

    /// 按指定方式归一化
    pub fn normalize(&mut self, mode: Normalization) -> Result<()> {
        match mode {
            Normalization::None => Ok(()),
            Normalization::Gaussian => self.normalize_gaussian(),
            Normalization::Uniform => self.normalize_uniform(),
        }
    }

    /// 高斯归一化：`(x - mean) / sigma`，重复调用无效果
    pub fn normalize_gaussian(&mut self) -> Result<()> {
        self.apply_stats(Normalization::Gaussian, CorpusStats::gaussian)
    }

    /// 均匀归一化：`(x - min) / (max - min)`，重复调用无效果
    pub fn normalize_uniform(&mut self) -> Result<()> {
        self.apply_stats(Normalization::Uniform, CorpusStats::uniform)
    }

    fn apply_stats(
        &mut self,
        mode: Normalization,
        compute: fn(&Array2<f64>) -> CorpusStats,
    ) -> Result<()> {
        match self.normalization() {
            Normalization::None => {}
            current if current == mode => return Ok(()),
            current => {
                return Err(Error::NormalizationGuard(format!(
                    "特征库已使用 {:?} 归一化，不能再使用 {:?}",
                    current, mode
                )));
            }
        }

        let stats = compute(&self.matrix()?);
        let mut view = BTreeMap::new();
        for (id, set) in &self.raw.features {
            view.insert(id.clone(), FeatureVectorSet::from_flat(&stats.apply(&set.to_flat()))?);
        }
        self.view = view;
        self.stats = Some(stats);
        info!("特征库已使用 {:?} 归一化", mode);
        Ok(())
    }

    /// 全部原始特征组成的矩阵，行按 id 排序
    fn matrix(&self) -> Result<Array2<f64>> {
        let n = self.len();
        let data = self.raw.features.values().flat_map(FeatureVectorSet::iter).collect();
        Array2::from_shape_vec((n, TOTAL_DIMS), data)
            .map_err(|e| Error::CorruptedData(format!("特征矩阵形状错误: {}", e)))
    }

    /// 会话视图中的组合特征：已归一化时返回归一化后的值，否则返回原始值
    pub fn select_features(&self, id: &str, mask: &FeatureMask) -> Option<Vec<f64>> {
        let set = if self.is_normalized() { self.view.get(id) } else { self.raw.features.get(id) };
        set.map(|s| mask.select(s))
    }

    /// 原始组合特征
    pub fn raw_features(&self, id: &str, mask: &FeatureMask) -> Option<Vec<f64>> {
        self.raw.features.get(id).map(|s| mask.select(s))
    }

    fn check_raw(&self) -> Result<()> {
        if self.raw.sizes.len() != self.raw.features.len()
            || self.raw.sizes.keys().ne(self.raw.features.keys())
        {
            return Err(Error::CorruptedData("文件大小表与特征表不一致".into()));
        }
        check_sets(&self.raw.features, "原始特征")
    }

    /// 检查原始特征、归一化视图以及统计量中是否存在 NaN、无穷大或极值
    pub fn check_data(&self) -> Result<()> {
        self.check_raw()?;
        check_sets(&self.view, "归一化特征")?;
        if let Some(stats) = &self.stats {
            if stats.values().any(is_corrupted) {
                return Err(Error::CorruptedData("统计量中存在非法数值".into()));
            }
        }
        Ok(())
    }
}

fn check_sets(sets: &BTreeMap<String, FeatureVectorSet>, kind: &str) -> Result<()> {
    for (id, set) in sets {
        if !set.is_well_formed() {
            return Err(Error::CorruptedData(format!("{} {} 维数不正确", kind, id)));
        }
        if let Some(x) = set.iter().find(|&x| is_corrupted(x)) {
            return Err(Error::CorruptedData(format!("{} {} 中存在非法数值 {}", kind, id, x)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};
    use rstest::rstest;

    use super::*;
    use crate::features::DEFAULT_DISPLACEMENT;
    use crate::source::MemorySource;

    fn flat(f: impl Fn(usize) -> f64) -> FeatureVectorSet {
        FeatureVectorSet::from_flat(&(0..TOTAL_DIMS).map(f).collect::<Vec<_>>()).unwrap()
    }

    /// 三张图片，第 0 维各不相同，其余维度恒定
    fn store() -> FeatureStore {
        let mut store = FeatureStore::new();
        for (i, id) in ["a", "b", "c"].into_iter().enumerate() {
            store.insert(id, 1, flat(|d| if d == 0 { i as f64 } else { 0.5 })).unwrap();
        }
        store
    }

    #[test]
    fn gaussian_view() {
        let mut store = store();
        store.normalize_gaussian().unwrap();
        let mask = FeatureMask::all();
        let values = ["a", "b", "c"]
            .map(|id| store.select_features(id, &mask).unwrap())
            .map(|v| (v[0], v[1], v[91]));
        assert_eq!(values.map(|v| v.0), [-1.0, 0.0, 1.0]);
        // 恒定维度被置 0
        assert!(values.iter().all(|v| v.1 == 0.0 && v.2 == 0.0));
        // 原始特征保持不变
        assert_eq!(store.raw_features("c", &mask).unwrap()[0], 2.0);
    }

    #[test]
    fn uniform_view() {
        let mut store = store();
        store.normalize_uniform().unwrap();
        let mask = FeatureMask::all();
        assert_eq!(store.select_features("b", &mask).unwrap()[0], 0.5);
        for id in ["a", "b", "c"] {
            let v = store.select_features(id, &mask).unwrap();
            assert!(v.iter().all(|x| (0.0..=1.0).contains(x)));
            assert_eq!(v[10], 0.0);
        }
    }

    #[rstest]
    #[case(Normalization::Gaussian, Normalization::Uniform)]
    #[case(Normalization::Uniform, Normalization::Gaussian)]
    fn normalization_is_exclusive(#[case] first: Normalization, #[case] second: Normalization) {
        let mut store = store();
        store.normalize(first).unwrap();
        let view = store.select_features("a", &FeatureMask::all());
        // 同一种方式重复调用无效果
        store.normalize(first).unwrap();
        assert_eq!(store.select_features("a", &FeatureMask::all()), view);
        assert!(matches!(store.normalize(second), Err(Error::NormalizationGuard(_))));
        assert_eq!(store.normalization(), first);
    }

    #[test]
    fn add_after_normalize_fails() {
        let mut store = store();
        store.normalize_gaussian().unwrap();
        let mut source = MemorySource::new();
        source.insert("d", 3, RgbImage::from_pixel(2, 2, Rgb([1, 2, 3])));
        let entry = source.entries().unwrap().remove(0);
        let err = store.add_image(&source, &entry, 1, 1).unwrap_err();
        assert!(matches!(err, Error::NormalizationGuard(_)));
        assert!(!store.contains("d"));
    }

    #[test]
    fn add_image_extracts_features() {
        let mut store = FeatureStore::new();
        let mut source = MemorySource::new();
        source.insert("d", 3, RgbImage::from_pixel(2, 2, Rgb([255, 255, 255])));
        let entry = source.entries().unwrap().remove(0);
        store.add_image(&source, &entry, 1, 1).unwrap();
        assert_eq!(store.size_of("d"), Some(3));
        let intensity = store.raw_features("d", &FeatureMask::only(crate::FeatureGroup::Intensity));
        assert_eq!(intensity.unwrap()[24], 1.0);
    }

    #[test]
    fn remove_and_clear() {
        let mut store = store();
        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert_eq!(store.len(), 2);
        store.normalize_uniform().unwrap();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.normalization(), Normalization::None);
    }

    #[rstest]
    #[case(Normalization::Gaussian)]
    #[case(Normalization::Uniform)]
    fn remove_invalidates_normalization(#[case] mode: Normalization) {
        let mask = FeatureMask::all();
        let mut store = store();
        store.normalize(mode).unwrap();
        assert!(store.remove("c"));
        assert_eq!(store.normalization(), Normalization::None);
        assert_eq!(store.select_features("a", &mask), store.raw_features("a", &mask));

        store.normalize(mode).unwrap();
        let mut fresh = self::store();
        fresh.remove("c");
        fresh.normalize(mode).unwrap();
        for id in ["a", "b"] {
            assert_eq!(store.select_features(id, &mask), fresh.select_features(id, &mask));
        }
    }

    #[test]
    fn displacement_is_shared_by_all_images() {
        let mut source = MemorySource::new();
        let gradient = RgbImage::from_fn(4, 4, |x, y| Rgb([(x * 60) as u8, (y * 60) as u8, 0]));
        source.insert("d", 3, gradient);
        source.insert("e", 4, RgbImage::from_pixel(4, 4, Rgb([9, 9, 9])));
        let entries = source.entries().unwrap();

        // 空库采用第一张图片的位移
        let mut store = FeatureStore::new();
        store.add_image(&source, &entries[0], 0, 3).unwrap();
        assert_eq!(store.displacement(), (0, 3));
        let err = store.add_image(&source, &entries[1], 1, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(!store.contains("e"));

        assert_eq!(store.reset_displacement((1, 1)), vec!["d".to_owned()]);
        assert!(store.is_empty());
        store.add_image(&source, &entries[1], 1, 1).unwrap();
        assert!(store.reset_displacement((1, 1)).is_empty());
        assert!(store.contains("e"));
    }

    #[test]
    fn check_data_detects_corruption() {
        let mut store = store();
        store.check_data().unwrap();
        store.insert("nan", 1, flat(|d| if d == 3 { f64::NAN } else { 0.0 })).unwrap();
        assert!(matches!(store.check_data(), Err(Error::CorruptedData(_))));

        let mut store = self::store();
        store.insert("inf", 1, flat(|_| f64::INFINITY)).unwrap();
        assert!(matches!(store.check_data(), Err(Error::CorruptedData(_))));
        assert!(store.save(&mut MemoryBackend::new()).is_err());
    }

    #[test]
    fn save_and_load() {
        let mut backend = MemoryBackend::new();
        let mut store = store();
        store.normalize_gaussian().unwrap();
        store.save(&mut backend).unwrap();

        let loaded = FeatureStore::load(&backend).unwrap();
        // 持久化的是原始特征，不包含归一化状态
        assert_eq!(loaded.normalization(), Normalization::None);
        assert_eq!(loaded.raw(), store.raw());
        assert_eq!(loaded.displacement(), DEFAULT_DISPLACEMENT);
    }
}
