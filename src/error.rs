use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// imrank 的错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 参数非法，例如距离阶数 p <= 0、向量长度不一致
    #[error("非法参数: {0}")]
    InvalidArgument(String),
    /// 存储或计算得到的数值中出现 NaN、无穷大或极值，需要重建数据库
    #[error("数据已损坏: {0}")]
    CorruptedData(String),
    /// 图片在枚举和读取之间消失
    #[error("图片不存在: {id}")]
    MissingFile { id: String },
    /// 向已归一化的实例添加记录，或重复使用不同的归一化方式
    #[error("归一化状态冲突: {0}")]
    NormalizationGuard(String),
    #[error("读写 {path} 失败: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("解码图片 {path} 失败: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("序列化失败: {0}")]
    Codec(#[from] bincode::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// 是否为致命错误。只有 MissingFile 允许当前流程继续
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MissingFile { .. })
    }
}
