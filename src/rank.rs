use log::{debug, warn};

use crate::error::{Error, Result};
use crate::feedback::WeightVector;
use crate::mask::FeatureMask;
use crate::record::RecordSet;
use crate::store::FeatureStore;

/// 加权 Minkowski 距离 `(Σ w_i · |x_i - y_i|^p)^(1/p)`
///
/// p = 1 为曼哈顿距离，p = 2 为欧氏距离
pub fn minkowski(x: &[f64], y: &[f64], w: &[f64], p: i32) -> Result<f64> {
    if p <= 0 {
        return Err(Error::invalid(format!("距离阶数 p 必须大于 0，实际为 {}", p)));
    }
    if x.len() != y.len() || x.len() != w.len() {
        return Err(Error::invalid(format!(
            "向量维数不一致: x = {}, y = {}, w = {}",
            x.len(),
            y.len(),
            w.len()
        )));
    }
    let sum: f64 = x.iter().zip(y).zip(w).map(|((a, b), w)| w * (a - b).abs().powi(p)).sum();
    Ok(match p {
        1 => sum,
        2 => sum.sqrt(),
        _ => sum.powf(1.0 / p as f64),
    })
}

/// 计算所有图片与查询图片的距离，写入 `record.distance`
///
/// 只负责计算距离，排序和分页由调用者完成。
/// 参数检查在修改任何记录之前完成，失败时不会留下部分结果。
/// 特征库中不存在的记录会从工作集中移除
pub fn rank(
    store: &FeatureStore,
    query_id: &str,
    p: i32,
    mask: &FeatureMask,
    weights: &WeightVector,
    records: &mut RecordSet,
) -> Result<()> {
    if p <= 0 {
        return Err(Error::invalid(format!("距离阶数 p 必须大于 0，实际为 {}", p)));
    }
    if weights.len() != mask.len() {
        return Err(Error::invalid(format!(
            "权重维数 {} 与特征维数 {} 不一致",
            weights.len(),
            mask.len()
        )));
    }
    let query = store
        .select_features(query_id, mask)
        .ok_or_else(|| Error::invalid(format!("查询图片不在特征库中: {}", query_id)))?;

    let missing = records.ids().filter(|id| !store.contains(id)).map(str::to_owned);
    for id in missing.collect::<Vec<_>>() {
        warn!("{}，已从结果中移除", Error::MissingFile { id: id.clone() });
        records.remove(&id);
    }

    let mut distances = Vec::with_capacity(records.len());
    for record in records.iter() {
        let features = store
            .select_features(&record.id, mask)
            .ok_or_else(|| Error::MissingFile { id: record.id.clone() })?;
        distances.push(minkowski(&query, &features, weights.as_slice(), p)?);
    }
    for (record, distance) in records.iter_mut().zip(distances) {
        record.distance = distance;
    }

    debug!("已计算 {} 张图片与 {} 的距离 (p = {}, mask = {})", records.len(), query_id, p, mask);
    Ok(())
}
