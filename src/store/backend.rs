use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::{DEFAULT_DISPLACEMENT, FeatureVectorSet};

/// 持久化格式版本，不一致时视为损坏，需要重建
pub const STORE_VERSION: u32 = 2;

/// 持久化的原始特征库
///
/// 只保存未归一化的原始特征、文件大小以及提取纹理特征时使用的共生矩阵位移，
/// 归一化状态与统计量从不持久化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDatabase {
    /// 库中所有纹理特征共用的位移 (dr, dc)
    pub displacement: (isize, isize),
    pub sizes: BTreeMap<String, u64>,
    pub features: BTreeMap<String, FeatureVectorSet>,
}

impl Default for RawDatabase {
    fn default() -> Self {
        Self {
            displacement: DEFAULT_DISPLACEMENT,
            sizes: BTreeMap::new(),
            features: BTreeMap::new(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    database: RawDatabase,
}

/// 将原始特征库编码为二进制
pub fn encode(db: &RawDatabase) -> Result<Vec<u8>> {
    #[derive(Serialize)]
    struct EnvelopeRef<'a> {
        version: u32,
        database: &'a RawDatabase,
    }
    Ok(bincode::serialize(&EnvelopeRef { version: STORE_VERSION, database: db })?)
}

/// 从二进制解码原始特征库，任何解码失败都视为数据损坏
pub fn decode(blob: &[u8]) -> Result<RawDatabase> {
    let envelope: Envelope = bincode::deserialize(blob)
        .map_err(|e| Error::CorruptedData(format!("无法解析特征库: {}", e)))?;
    if envelope.version != STORE_VERSION {
        return Err(Error::CorruptedData(format!(
            "特征库版本不匹配: {} != {}",
            envelope.version, STORE_VERSION
        )));
    }
    Ok(envelope.database)
}

/// 特征库的存储后端
pub trait Backend {
    /// 读取已保存的数据，不存在时返回 None
    fn read(&self) -> Result<Option<Vec<u8>>>;
    /// 覆盖写入
    fn write(&mut self, blob: &[u8]) -> Result<()>;
    /// 删除已保存的数据
    fn remove(&mut self) -> Result<()>;
}

/// 保存在图片目录下的特征库文件
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tmp.into()
    }
}

impl Backend for FileBackend {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    /// 先写入临时文件再重命名，避免中断时留下写了一半的文件
    fn write(&mut self, blob: &[u8]) -> Result<()> {
        let tmp = self.tmp_path();
        std::fs::write(&tmp, blob).map_err(|e| Error::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| Error::io(&self.path, e))?;
        debug!("写入特征库 {} ({} 字节)", self.path.display(), blob.len());
        Ok(())
    }

    /// 同时删除上次中断留下的临时文件
    fn remove(&mut self) -> Result<()> {
        for path in [self.path.clone(), self.tmp_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("已删除 {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(&path, e)),
            }
        }
        Ok(())
    }
}

/// 内存后端，记录写入次数
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    blob: Option<Vec<u8>>,
    writes: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Backend for MemoryBackend {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.blob.clone())
    }

    fn write(&mut self, blob: &[u8]) -> Result<()> {
        self.blob = Some(blob.to_vec());
        self.writes += 1;
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        self.blob = None;
        Ok(())
    }
}
