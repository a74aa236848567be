use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

/// 图片记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    /// 图片 ID，即相对于图片目录的文件名
    pub id: String,
    /// 图片路径
    pub path: PathBuf,
    /// 文件字节长度，仅用于判断文件是否变化
    pub size: u64,
    /// 是否被用户标记为相关
    pub relevant: bool,
    /// 与查询图片的距离
    pub distance: f64,
}

impl ImageRecord {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self { id: id.into(), path: path.into(), size, relevant: false, distance: 0.0 }
    }
}

/// 当前会话中的图片记录集合，按 ID 排序
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: BTreeMap<String, ImageRecord>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ImageRecord> {
        self.records.get(id)
    }

    /// 插入或替换一条记录
    pub fn insert(&mut self, record: ImageRecord) -> Option<ImageRecord> {
        self.records.insert(record.id.clone(), record)
    }

    pub fn remove(&mut self, id: &str) -> Option<ImageRecord> {
        self.records.remove(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageRecord> {
        self.records.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ImageRecord> {
        self.records.values_mut()
    }

    /// 保留满足条件的记录
    pub fn retain(&mut self, mut f: impl FnMut(&ImageRecord) -> bool) {
        self.records.retain(|_, r| f(r));
    }

    /// 标记图片是否相关，返回图片是否存在
    pub fn mark_relevant(&mut self, id: &str, relevant: bool) -> bool {
        match self.records.get_mut(id) {
            Some(record) => {
                record.relevant = relevant;
                true
            }
            None => false,
        }
    }

    pub fn clear_relevance(&mut self) {
        self.records.values_mut().for_each(|r| r.relevant = false);
    }

    /// 被标记为相关的图片 ID
    pub fn relevant_ids(&self) -> Vec<&str> {
        self.records.values().filter(|r| r.relevant).map(|r| r.id.as_str()).collect()
    }

    /// 按距离升序排列的记录，距离相同时按 ID 排序
    pub fn sorted_by_distance(&self) -> Vec<&ImageRecord> {
        let mut sorted = self.records.values().collect::<Vec<_>>();
        // BTreeMap 已按 ID 排序，稳定排序即可保证距离相同时的顺序
        sorted.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        sorted
    }
}

impl FromIterator<ImageRecord> for RecordSet {
    fn from_iter<T: IntoIterator<Item = ImageRecord>>(iter: T) -> Self {
        Self { records: iter.into_iter().map(|r| (r.id.clone(), r)).collect() }
    }
}
