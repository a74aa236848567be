use std::collections::{BTreeMap, BTreeSet};

use indicatif::ProgressBar;
use log::{debug, info, warn};
use serde::Serialize;

use super::{Backend, FeatureStore, Normalization};
use crate::error::{Error, Result};
use crate::features::DEFAULT_DISPLACEMENT;
use crate::record::{ImageRecord, RecordSet};
use crate::source::{ImageEntry, ImageSource};
use crate::utils::pb_style;

/// 同步参数
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// 共生矩阵位移 (dr, dc)
    pub displacement: (isize, isize),
    /// 同步完成后对内存视图使用的归一化方式
    pub normalization: Normalization,
    /// 是否显示进度条
    pub progress: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            displacement: DEFAULT_DISPLACEMENT,
            normalization: Normalization::None,
            progress: false,
        }
    }
}

/// 一次同步的结果统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// 新增的图片数量
    pub added: usize,
    /// 文件大小变化、重新提取特征的图片数量
    pub updated: usize,
    /// 文件已删除、从库中移除的图片数量
    pub removed: usize,
    /// 枚举后读取时已消失的图片数量
    pub missing: usize,
    /// 是否写入了存储
    pub persisted: bool,
}

impl SyncReport {
    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0 && self.missing == 0
    }
}

impl FeatureStore {
    /// 将特征库、图片记录与图片目录同步
    ///
    /// 0. 共生矩阵位移与库中不一致时，丢弃全部特征重新提取
    /// 1. 新图片、或文件大小变化的图片：删除旧记录，重新提取特征
    /// 2. 已不存在的图片：从特征库和记录中删除
    /// 3. 特征库中有、记录中没有的图片：创建占位记录
    /// 4. 特征库有变化时先保存原始特征
    /// 5. 最后对内存视图做归一化
    ///
    /// 目录没有变化时重复调用不会修改任何数据，也不会写入存储
    pub fn synchronize(
        &mut self,
        source: &dyn ImageSource,
        backend: &mut dyn Backend,
        records: &mut RecordSet,
        opts: &SyncOptions,
    ) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let entries = source
            .entries()?
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect::<BTreeMap<_, _>>();

        // 0. 位移变化，所有纹理特征都需要重新计算
        if opts.displacement != self.displacement() && self.is_normalized() {
            return Err(Error::NormalizationGuard(format!(
                "特征库已归一化，无法以位移 {:?} 重建特征，请重新加载特征库",
                opts.displacement
            )));
        }
        let rebuilt =
            self.reset_displacement(opts.displacement).into_iter().collect::<BTreeSet<_>>();

        // 1. 新增或变化的图片
        let pending = entries
            .values()
            .filter(|e| self.size_of(&e.id) != Some(e.size))
            .cloned()
            .collect::<Vec<_>>();
        if !pending.is_empty() && self.is_normalized() {
            return Err(Error::NormalizationGuard(format!(
                "特征库已归一化，无法同步 {} 张新图片，请重新加载特征库",
                pending.len()
            )));
        }
        let mut changed = !rebuilt.is_empty();
        changed |= self.extract_pending(source, &pending, &rebuilt, records, opts, &mut report)?;

        // 2. 已删除的图片
        let stale = self.ids().filter(|id| !entries.contains_key(*id)).map(str::to_owned);
        for id in stale.collect::<Vec<_>>() {
            debug!("图片已删除: {}", id);
            self.remove(&id);
            records.remove(&id);
            report.removed += 1;
            changed = true;
        }

        // 3. 补齐记录，并丢弃没有特征的记录
        records.retain(|r| self.contains(&r.id));
        for (id, entry) in &entries {
            if !self.contains(id) {
                continue;
            }
            if records.get(id).is_none_or(|r| r.size != entry.size) {
                records.insert(ImageRecord::new(id.as_str(), entry.path.clone(), entry.size));
            }
        }

        // 4. 保存原始特征
        if changed {
            self.save(backend)?;
            report.persisted = true;
        }

        // 5. 归一化仅作用于内存
        self.normalize(opts.normalization)?;
        self.check_data()?;

        if report.is_unchanged() {
            debug!("特征库无变化，共 {} 张图片", self.len());
        } else {
            info!(
                "同步完成：新增 {}，更新 {}，删除 {}，丢失 {}，共 {} 张图片",
                report.added,
                report.updated,
                report.removed,
                report.missing,
                self.len()
            );
        }
        Ok(report)
    }

    fn extract_pending(
        &mut self,
        source: &dyn ImageSource,
        pending: &[ImageEntry],
        rebuilt: &BTreeSet<String>,
        records: &mut RecordSet,
        opts: &SyncOptions,
        report: &mut SyncReport,
    ) -> Result<bool> {
        let pb = if opts.progress && !pending.is_empty() {
            ProgressBar::new(pending.len() as u64).with_style(pb_style())
        } else {
            ProgressBar::hidden()
        };
        let (dr, dc) = opts.displacement;
        let mut changed = false;

        for entry in pending {
            let updated = self.remove(&entry.id) || rebuilt.contains(&entry.id);
            changed |= updated;
            if updated {
                debug!("重新提取特征: {}", entry.id);
                records.remove(&entry.id);
            }
            pb.set_message(entry.id.clone());
            match self.add_image(source, entry, dr, dc) {
                Ok(()) => {
                    changed = true;
                    if updated {
                        report.updated += 1;
                    } else {
                        report.added += 1;
                    }
                }
                // 读取过程中被删除的文件可能表现为解码失败
                Err(e) if !e.is_fatal() || !source.exists(entry) => {
                    warn!("图片在读取前已消失: {}", entry.id);
                    records.remove(&entry.id);
                    report.missing += 1;
                }
                Err(e) => {
                    pb.abandon_with_message(format!("提取特征失败: {}", entry.id));
                    return Err(e);
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok(changed)
    }
}
