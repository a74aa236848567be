use anyhow::{Result, anyhow};
use clap::Parser;
use serde_json::json;

use super::open_session;
use crate::cli::{OutputFormat, SubCommandExtend};
use crate::config::{FeatureOptions, Opts, parse_mask};
use crate::mask::FeatureMask;

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    #[command(flatten)]
    pub feature: FeatureOptions,
    /// 图片 ID
    pub id: String,
    /// 显示的特征分组
    #[arg(short, long, value_name = "GROUPS", default_value = "all", value_parser = parse_mask)]
    pub mask: FeatureMask,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for ShowCommand {
    fn run(&self, opts: &Opts) -> Result<()> {
        let (session, _) = open_session(opts, &self.feature)?;
        let values = session
            .store()
            .select_features(&self.id, &self.mask)
            .ok_or_else(|| anyhow!("图片不在特征库中: {}", self.id))?;

        match self.output_format {
            OutputFormat::Json => {
                let value = json!({
                    "id": self.id,
                    "mask": self.mask.to_string(),
                    "normalization": session.store().normalization(),
                    "features": values,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            OutputFormat::Table => {
                for (i, v) in values.iter().enumerate() {
                    let (group, offset) = self
                        .mask
                        .locate(i)
                        .ok_or_else(|| anyhow!("特征下标越界: {}", i))?;
                    println!("{}[{}]\t{:.6}", group.name(), offset, v);
                }
            }
        }
        Ok(())
    }
}
