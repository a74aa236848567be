use clap::ValueEnum;
use ndarray::{Array1, Array2, Axis};
use serde::Serialize;

use crate::utils::{EPSILON, snap_zero};

/// 特征库的归一化方式，两种方式互斥
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Normalization {
    /// 使用原始特征
    #[default]
    None,
    /// 按维度转换为 z-score
    Gaussian,
    /// 按维度线性缩放到 [0, 1]
    Uniform,
}

/// 全库按维度统计量
#[derive(Debug, Clone, PartialEq)]
pub enum CorpusStats {
    Gaussian { mean: Array1<f64>, sigma: Array1<f64> },
    Uniform { min: Array1<f64>, max: Array1<f64> },
}

impl CorpusStats {
    /// 计算每一维的均值和样本标准差 (N - 1)
    ///
    /// 图片少于两张时标准差无定义，记为 0
    pub fn gaussian(matrix: &Array2<f64>) -> Self {
        let n = matrix.nrows();
        let mean = matrix.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(matrix.ncols()));
        let sigma = if n >= 2 {
            matrix.std_axis(Axis(0), 1.0)
        } else {
            Array1::zeros(matrix.ncols())
        };
        Self::Gaussian { mean, sigma }
    }

    /// 计算每一维的最小值和最大值
    pub fn uniform(matrix: &Array2<f64>) -> Self {
        if matrix.nrows() == 0 {
            let zeros = Array1::zeros(matrix.ncols());
            return Self::Uniform { min: zeros.clone(), max: zeros };
        }
        let min = matrix.fold_axis(Axis(0), f64::INFINITY, |acc, &x| acc.min(x));
        let max = matrix.fold_axis(Axis(0), f64::NEG_INFINITY, |acc, &x| acc.max(x));
        Self::Uniform { min, max }
    }

    pub fn mode(&self) -> Normalization {
        match self {
            Self::Gaussian { .. } => Normalization::Gaussian,
            Self::Uniform { .. } => Normalization::Uniform,
        }
    }

    /// 对一行原始特征做归一化
    ///
    /// 标准差或取值范围低于 [`EPSILON`] 的维度不携带信息，直接置 0
    pub fn apply(&self, row: &[f64]) -> Vec<f64> {
        match self {
            Self::Gaussian { mean, sigma } => row
                .iter()
                .zip(mean.iter().zip(sigma))
                .map(|(&v, (&m, &s))| if s < EPSILON { 0.0 } else { snap_zero((v - m) / s) })
                .collect(),
            Self::Uniform { min, max } => row
                .iter()
                .zip(min.iter().zip(max))
                .map(|(&v, (&lo, &hi))| {
                    let range = hi - lo;
                    if range < EPSILON { 0.0 } else { ((v - lo) / range).clamp(0.0, 1.0) }
                })
                .collect(),
        }
    }

    /// 所有统计量，用于数据校验
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        let (a, b) = match self {
            Self::Gaussian { mean, sigma } => (mean, sigma),
            Self::Uniform { min, max } => (min, max),
        };
        a.iter().chain(b.iter()).copied()
    }
}
