use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::store::{Backend, FileBackend};

#[derive(Parser, Debug, Clone)]
pub struct CleanCommand {}

impl SubCommandExtend for CleanCommand {
    fn run(&self, opts: &Opts) -> Result<()> {
        let mut backend = FileBackend::new(opts.dir.store());
        info!("删除特征库: {}", backend.path().display());
        backend.remove()?;
        info!("清理完成");
        Ok(())
    }
}
