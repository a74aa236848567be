pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod feedback;
pub mod mask;
pub mod rank;
pub mod record;
pub mod session;
pub mod source;
pub mod store;
pub mod utils;

pub use config::Opts;
pub use error::{Error, Result};
pub use features::{FeatureVectorSet, extract};
pub use feedback::{WeightVector, adjust_weights};
pub use mask::{FeatureGroup, FeatureMask};
pub use rank::{minkowski, rank};
pub use record::{ImageRecord, RecordSet};
pub use session::Session;
pub use source::{FolderSource, ImageEntry, ImageSource, MemorySource};
pub use store::{FeatureStore, FileBackend, MemoryBackend, Normalization, SyncOptions, SyncReport};
