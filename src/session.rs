//! 一次检索会话
//!
//! 会话持有特征库、图片记录、特征掩码和当前权重。
//! 原始特征不会被修改，每一轮反馈都从原始特征重新计算，只有权重会延续到下一轮

use log::{debug, info};

use crate::error::{Error, Result};
use crate::feedback::{WeightVector, adjust_weights};
use crate::mask::FeatureMask;
use crate::rank;
use crate::record::{ImageRecord, RecordSet};
use crate::source::ImageSource;
use crate::store::{Backend, FeatureStore, SyncOptions, SyncReport};

pub struct Session {
    store: FeatureStore,
    backend: Box<dyn Backend>,
    records: RecordSet,
    mask: FeatureMask,
    weights: WeightVector,
    opts: SyncOptions,
}

impl Session {
    /// 从后端加载特征库并与图片来源同步
    ///
    /// # Arguments
    ///
    /// * `source` - 图片来源
    /// * `backend` - 特征库存储
    /// * `opts` - 共生矩阵位移、归一化方式等参数
    pub fn open(
        source: &dyn ImageSource,
        backend: Box<dyn Backend>,
        opts: SyncOptions,
    ) -> Result<(Self, SyncReport)> {
        let store = FeatureStore::load(backend.as_ref())?;
        let mask = FeatureMask::all();
        let mut session = Self {
            store,
            backend,
            records: RecordSet::new(),
            mask,
            weights: WeightVector::uniform(mask.len()),
            opts,
        };
        let report = session.synchronize(source)?;
        info!("会话已打开，共 {} 张图片，归一化方式 {:?}", session.len(), opts.normalization);
        Ok((session, report))
    }

    /// 重新与图片来源同步
    pub fn synchronize(&mut self, source: &dyn ImageSource) -> Result<SyncReport> {
        self.store.synchronize(source, self.backend.as_mut(), &mut self.records, &self.opts)
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    pub fn mask(&self) -> &FeatureMask {
        &self.mask
    }

    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 修改特征掩码，权重重置为均匀权重
    pub fn set_mask(&mut self, mask: FeatureMask) -> Result<()> {
        if mask.is_empty() {
            return Err(Error::invalid("至少需要选择一个特征分组"));
        }
        self.mask = mask;
        self.reset_weights();
        debug!("特征掩码: {}，维数 {}", mask, mask.len());
        Ok(())
    }

    pub fn reset_weights(&mut self) {
        self.weights = WeightVector::uniform(self.mask.len());
    }

    /// 标记或取消标记相关图片
    pub fn mark_relevant(&mut self, id: &str, relevant: bool) -> Result<()> {
        if !self.records.mark_relevant(id, relevant) {
            return Err(Error::invalid(format!("图片不在记录中: {}", id)));
        }
        Ok(())
    }

    pub fn clear_relevance(&mut self) {
        self.records.clear_relevance();
    }

    /// 根据当前的相关标记更新权重
    pub fn feedback(&mut self, query_id: &str) -> Result<&WeightVector> {
        self.weights =
            adjust_weights(query_id, &self.mask, &self.records, &self.store, &self.weights)?;
        Ok(&self.weights)
    }

    /// 计算所有图片到查询图片的距离
    ///
    /// # Arguments
    ///
    /// * `query_id` - 查询图片
    /// * `p` - Minkowski 距离的阶数
    pub fn rank(&mut self, query_id: &str, p: i32) -> Result<()> {
        rank::rank(&self.store, query_id, p, &self.mask, &self.weights, &mut self.records)
    }

    /// 按距离升序排列的记录
    pub fn results(&self) -> Vec<&ImageRecord> {
        self.records.sorted_by_distance()
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;
    use crate::mask::FeatureGroup;
    use crate::source::{FolderSource, MemorySource};
    use crate::store::{FileBackend, MemoryBackend, Normalization, STORE_FILE};

    fn gradient(seed: u32) -> RgbImage {
        RgbImage::from_fn(8, 8, |x, y| {
            Rgb([(x * 30 + seed) as u8, (y * 25 + seed * 2) as u8, ((x + y) * 10 + seed) as u8])
        })
    }

    fn source() -> MemorySource {
        let mut source = MemorySource::new();
        source.insert("a.png", 10, gradient(0));
        source.insert("b.png", 20, gradient(20));
        source.insert("c.png", 30, gradient(150));
        source
    }

    fn open(source: &MemorySource, normalization: Normalization) -> Session {
        let opts = SyncOptions { normalization, ..Default::default() };
        Session::open(source, Box::new(MemoryBackend::new()), opts).unwrap().0
    }

    #[test]
    fn three_image_scenario() {
        let source = source();
        let mut session = open(&source, Normalization::None);
        session.set_mask(FeatureMask::only(FeatureGroup::Intensity)).unwrap();
        session.rank("a.png", 1).unwrap();

        assert_eq!(session.len(), 3);
        assert!(session.records().iter().all(|r| r.distance.is_finite()));
        let results = session.results();
        assert_eq!(results[0].id, "a.png");
        assert_eq!(results[0].distance, 0.0);
    }

    #[test]
    fn feedback_round() {
        let source = source();
        let mut session = open(&source, Normalization::Gaussian);
        session.mark_relevant("b.png", true).unwrap();
        let weights = session.feedback("a.png").unwrap().clone();

        assert_eq!(weights.len(), session.mask().len());
        assert!(weights.as_slice().iter().all(|w| *w >= 0.0));
        assert!((weights.sum() - 1.0).abs() < 1e-9);

        session.rank("a.png", 2).unwrap();
        assert_eq!(session.results()[0].id, "a.png");
    }

    #[test]
    fn feedback_rounds_start_from_raw_data() {
        let source = source();
        let mut session = open(&source, Normalization::None);
        session.mark_relevant("b.png", true).unwrap();
        let first = session.feedback("a.png").unwrap().clone();
        let second = session.feedback("a.png").unwrap().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn set_mask_resets_weights() {
        let source = source();
        let mut session = open(&source, Normalization::None);
        session.mark_relevant("c.png", true).unwrap();
        session.feedback("a.png").unwrap();

        let mask = FeatureMask::only(FeatureGroup::ColorCode);
        session.set_mask(mask).unwrap();
        assert_eq!(session.weights(), &WeightVector::uniform(64));
        assert!(session.set_mask(FeatureMask::none()).is_err());
        assert_eq!(session.mask(), &mask);
    }

    #[test]
    fn mark_unknown_image() {
        let source = source();
        let mut session = open(&source, Normalization::None);
        assert!(matches!(session.mark_relevant("zzz.png", true), Err(Error::InvalidArgument(_))));
        session.mark_relevant("a.png", true).unwrap();
        session.clear_relevance();
        assert!(session.records().relevant_ids().is_empty());
    }

    #[test]
    fn reopen_from_folder() {
        let dir = tempfile::tempdir().unwrap();
        for (name, seed) in [("a.png", 0), ("b.png", 80)] {
            gradient(seed).save(dir.path().join(name)).unwrap();
        }
        let source = FolderSource::new(dir.path(), "png").unwrap();
        let backend = || Box::new(FileBackend::new(dir.path().join(STORE_FILE)));

        let (session, report) = Session::open(&source, backend(), SyncOptions::default()).unwrap();
        assert_eq!(report.added, 2);
        assert!(report.persisted);
        assert_eq!(session.len(), 2);

        let (session, report) = Session::open(&source, backend(), SyncOptions::default()).unwrap();
        assert!(report.is_unchanged());
        assert!(!report.persisted);
        assert_eq!(session.records().ids().collect::<Vec<_>>(), vec!["a.png", "b.png"]);
    }
}
