use anyhow::Result;
use clap::Parser;
use log::info;

use super::open_session;
use crate::cli::{OutputFormat, SubCommandExtend};
use crate::config::{FeatureOptions, Opts};

#[derive(Parser, Debug, Clone)]
pub struct SyncCommand {
    #[command(flatten)]
    pub feature: FeatureOptions,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SyncCommand {
    fn run(&self, opts: &Opts) -> Result<()> {
        info!("同步图片目录: {}", opts.dir.path().display());
        let (session, report) = open_session(opts, &self.feature)?;

        match self.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Table => {
                println!("added\t{}", report.added);
                println!("updated\t{}", report.updated);
                println!("removed\t{}", report.removed);
                println!("missing\t{}", report.missing);
                println!("total\t{}", session.len());
            }
        }
        Ok(())
    }
}
