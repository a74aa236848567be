use std::path::Path;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use log::{debug, info};

use super::open_session;
use crate::cli::SubCommandExtend;
use crate::config::{FeatureOptions, Opts, SearchOptions};
use crate::session::Session;
use crate::utils::measure;

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub feature: FeatureOptions,
    #[command(flatten)]
    pub search: SearchOptions,
    /// 查询图片，可以是图片 ID 或目录中的图片路径
    pub query: String,
    /// 标记为相关的图片，多个 ID 用逗号分隔，会先进行一轮相关反馈再排序
    #[arg(short, long, value_name = "ID,...", value_delimiter = ',')]
    pub relevant: Vec<String>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    fn run(&self, opts: &Opts) -> Result<()> {
        let (mut session, _) = open_session(opts, &self.feature)?;
        let query = resolve_id(&session, &self.query)?;

        session.set_mask(self.search.mask)?;
        for id in &self.relevant {
            let id = resolve_id(&session, id)?;
            session.mark_relevant(&id, true)?;
        }
        if !self.relevant.is_empty() {
            let weights = session.feedback(&query)?;
            debug!("反馈后的权重: {:?}", weights.as_slice());
        }

        let (ranked, elapsed) = measure(|| session.rank(&query, self.search.p));
        ranked?;
        info!("排序 {} 张图片耗时 {:.2}ms", session.len(), elapsed.as_secs_f64() * 1000.0);

        let result = session
            .results()
            .into_iter()
            .take(self.search.count)
            .map(|r| (r.distance, r.id.clone()))
            .collect::<Vec<_>>();
        print_result(&result, self.output_format)
    }
}

/// 将查询参数解析为图片 ID，允许直接传入目录中的图片路径
fn resolve_id(session: &Session, query: &str) -> Result<String> {
    if session.records().contains(query) {
        return Ok(query.to_owned());
    }
    let name = Path::new(query).file_name().map(|s| s.to_string_lossy().into_owned());
    match name {
        Some(name) if session.records().contains(&name) => Ok(name),
        _ => bail!("图片不在目录中: {}", query),
    }
}

fn print_result(result: &[(f64, String)], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for (k, v) in result {
                println!("{:.6}\t{}", k, v);
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}
