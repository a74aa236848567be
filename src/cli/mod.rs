mod check;
mod clean;
mod search;
mod show;
mod sync;

pub use check::*;
pub use clean::*;
pub use search::*;
pub use show::*;
pub use sync::*;

use anyhow::{Context, Result};

use crate::config::{FeatureOptions, Opts};
use crate::session::Session;
use crate::source::FolderSource;
use crate::store::{FileBackend, SyncReport};

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> Result<()>;
}

/// 打开图片目录对应的会话，同步特征库
fn open_session(opts: &Opts, feature: &FeatureOptions) -> Result<(Session, SyncReport)> {
    let source = FolderSource::new(opts.dir.path(), &feature.suffix)?;
    let backend = Box::new(FileBackend::new(opts.dir.store()));
    Session::open(&source, backend, feature.sync_options())
        .with_context(|| format!("无法打开图片目录 {}", opts.dir.path().display()))
}
