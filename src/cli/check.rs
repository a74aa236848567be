use anyhow::{Result, bail};
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::store::{FeatureStore, FileBackend};
use crate::utils::file_size;

#[derive(Parser, Debug, Clone)]
pub struct CheckCommand {}

impl SubCommandExtend for CheckCommand {
    fn run(&self, opts: &Opts) -> Result<()> {
        let path = opts.dir.store();
        if !path.exists() {
            bail!("特征库不存在: {}", path.display());
        }
        info!("检查特征库: {}", path.display());
        // 加载时会校验所有原始特征
        let store = FeatureStore::load(&FileBackend::new(&path))?;
        println!("{}\t{} 张图片\t{} 字节", path.display(), store.len(), file_size(&path)?);
        Ok(())
    }
}
