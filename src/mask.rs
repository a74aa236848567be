use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::features::{COLOR_CODE_BINS, FeatureVectorSet, INTENSITY_BINS};

/// 特征分组，顺序即拼接顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureGroup {
    Intensity,
    ColorCode,
    Energy,
    Entropy,
    Contrast,
}

impl FeatureGroup {
    pub const ALL: [FeatureGroup; 5] =
        [Self::Intensity, Self::ColorCode, Self::Energy, Self::Entropy, Self::Contrast];

    /// 该分组在 92 维原始向量中的起始位置
    pub fn offset(self) -> usize {
        match self {
            Self::Intensity => 0,
            Self::ColorCode => INTENSITY_BINS,
            Self::Energy => INTENSITY_BINS + COLOR_CODE_BINS,
            Self::Entropy => INTENSITY_BINS + COLOR_CODE_BINS + 1,
            Self::Contrast => INTENSITY_BINS + COLOR_CODE_BINS + 2,
        }
    }

    pub fn len(self) -> usize {
        match self {
            Self::Intensity => INTENSITY_BINS,
            Self::ColorCode => COLOR_CODE_BINS,
            Self::Energy | Self::Entropy | Self::Contrast => 1,
        }
    }

    fn values(self, set: &FeatureVectorSet) -> &[f64] {
        match self {
            Self::Intensity => &set.intensity,
            Self::ColorCode => &set.color_code,
            Self::Energy => &set.texture[0..1],
            Self::Entropy => &set.texture[1..2],
            Self::Contrast => &set.texture[2..3],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Intensity => "intensity",
            Self::ColorCode => "color",
            Self::Energy => "energy",
            Self::Entropy => "entropy",
            Self::Contrast => "contrast",
        }
    }
}

/// 特征选择掩码，决定组合向量包含哪些分组
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureMask {
    pub intensity: bool,
    pub color_code: bool,
    pub energy: bool,
    pub entropy: bool,
    pub contrast: bool,
}

impl Default for FeatureMask {
    fn default() -> Self {
        Self::all()
    }
}

impl FeatureMask {
    pub const fn all() -> Self {
        Self { intensity: true, color_code: true, energy: true, entropy: true, contrast: true }
    }

    pub const fn none() -> Self {
        Self { intensity: false, color_code: false, energy: false, entropy: false, contrast: false }
    }

    pub fn only(group: FeatureGroup) -> Self {
        Self::none().with(group, true)
    }

    pub fn with(mut self, group: FeatureGroup, on: bool) -> Self {
        match group {
            FeatureGroup::Intensity => self.intensity = on,
            FeatureGroup::ColorCode => self.color_code = on,
            FeatureGroup::Energy => self.energy = on,
            FeatureGroup::Entropy => self.entropy = on,
            FeatureGroup::Contrast => self.contrast = on,
        }
        self
    }

    pub fn contains(&self, group: FeatureGroup) -> bool {
        match group {
            FeatureGroup::Intensity => self.intensity,
            FeatureGroup::ColorCode => self.color_code,
            FeatureGroup::Energy => self.energy,
            FeatureGroup::Entropy => self.entropy,
            FeatureGroup::Contrast => self.contrast,
        }
    }

    /// 按固定顺序返回选中的分组
    pub fn groups(&self) -> impl Iterator<Item = FeatureGroup> + '_ {
        FeatureGroup::ALL.into_iter().filter(|g| self.contains(*g))
    }

    /// 组合向量的维数
    pub fn len(&self) -> usize {
        self.groups().map(FeatureGroup::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 组合向量的每一维在原始 92 维向量中的下标
    pub fn dims(&self) -> Vec<usize> {
        self.groups().flat_map(|g| g.offset()..g.offset() + g.len()).collect()
    }

    /// 将组合向量中的下标映射回 (分组, 分组内偏移)
    pub fn locate(&self, index: usize) -> Option<(FeatureGroup, usize)> {
        let mut start = 0;
        for group in self.groups() {
            if index < start + group.len() {
                return Some((group, index - start));
            }
            start += group.len();
        }
        None
    }

    /// 按掩码拼接特征向量
    pub fn select(&self, set: &FeatureVectorSet) -> Vec<f64> {
        let mut v = Vec::with_capacity(self.len());
        for group in self.groups() {
            v.extend_from_slice(group.values(set));
        }
        v
    }
}

impl fmt::Display for FeatureMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.groups().map(FeatureGroup::name).collect::<Vec<_>>();
        write!(f, "{}", names.join(","))
    }
}

impl FromStr for FeatureMask {
    type Err = Error;

    /// 解析逗号分隔的分组名，`all` 或 `texture` 为快捷写法
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mask = Self::none();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            mask = match part.to_ascii_lowercase().as_str() {
                "all" => Self::all(),
                "intensity" | "i" => mask.with(FeatureGroup::Intensity, true),
                "color" | "colorcode" | "color_code" | "c" => {
                    mask.with(FeatureGroup::ColorCode, true)
                }
                "energy" => mask.with(FeatureGroup::Energy, true),
                "entropy" => mask.with(FeatureGroup::Entropy, true),
                "contrast" => mask.with(FeatureGroup::Contrast, true),
                "texture" | "t" => mask
                    .with(FeatureGroup::Energy, true)
                    .with(FeatureGroup::Entropy, true)
                    .with(FeatureGroup::Contrast, true),
                other => return Err(Error::invalid(format!("未知的特征分组: {}", other))),
            };
        }
        if mask.is_empty() {
            return Err(Error::invalid("至少需要选择一个特征分组"));
        }
        Ok(mask)
    }
}
