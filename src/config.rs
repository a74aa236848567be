use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Parser, Subcommand};

use crate::cli::*;
use crate::features::DEFAULT_DISPLACEMENT;
use crate::mask::FeatureMask;
use crate::source::DEFAULT_SUFFIX;
use crate::store::{Normalization, STORE_FILE, SyncOptions};

#[derive(Parser, Debug, Clone)]
pub struct FeatureOptions {
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = DEFAULT_SUFFIX)]
    pub suffix: String,
    /// 特征归一化方式，只作用于本次运行，不会写回特征库
    #[arg(long, value_name = "MODE", value_enum, default_value_t = Normalization::None)]
    pub normalize: Normalization,
    /// 共生矩阵的行位移
    #[arg(long, value_name = "N", default_value_t = DEFAULT_DISPLACEMENT.0, allow_hyphen_values = true)]
    pub dr: isize,
    /// 共生矩阵的列位移
    #[arg(long, value_name = "N", default_value_t = DEFAULT_DISPLACEMENT.1, allow_hyphen_values = true)]
    pub dc: isize,
    /// 不显示进度条
    #[arg(long)]
    pub no_progress: bool,
}

impl FeatureOptions {
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            displacement: (self.dr, self.dc),
            normalization: self.normalize,
            progress: !self.no_progress,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// 参与比较的特征分组，逗号分隔：intensity,color,energy,entropy,contrast
    /// 也可以使用 all 或 texture
    #[arg(short, long, value_name = "GROUPS", default_value = "all", value_parser = parse_mask, verbatim_doc_comment)]
    pub mask: FeatureMask,
    /// Minkowski 距离的阶数，1 为曼哈顿距离，2 为欧氏距离
    #[arg(short, value_name = "P", default_value_t = 1, value_parser = clap::value_parser!(i32).range(1..))]
    pub p: i32,
    /// 显示的结果数量
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    pub count: usize,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "imrank", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 图片目录，特征库保存在该目录下
    #[arg(short, long, default_value = ".")]
    pub dir: StoreDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 同步图片目录与特征库
    Sync(SyncCommand),
    /// 按相似度对目录中的图片排序
    Search(SearchCommand),
    /// 显示一张图片的特征向量
    Show(ShowCommand),
    /// 检查特征库中的数据
    Check(CheckCommand),
    /// 删除特征库
    Clean(CleanCommand),
}

#[derive(Debug, Clone)]
pub struct StoreDir {
    path: PathBuf,
}

impl StoreDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回特征库文件的路径
    pub fn store(&self) -> PathBuf {
        self.path.join(STORE_FILE)
    }
}

impl FromStr for StoreDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

pub(crate) fn parse_mask(s: &str) -> anyhow::Result<FeatureMask> {
    Ok(s.parse()?)
}
