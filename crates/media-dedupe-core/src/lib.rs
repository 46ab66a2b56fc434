pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod hasher;
pub mod model;
pub mod policy;
pub mod progress;
pub mod storage;

pub use config::{DedupeConfig, DedupeMode, PhaseSpec};
pub use engine::{DedupeEngine, DedupeOutcome, ResultSet, RunStats};
pub use error::Error;
pub use hasher::{BitCode, HashKind};
pub use model::{DuplicateGroup, GroupId, MediaRecord, OutputRow, QualityHint};
pub use policy::{default_policy, PriorityClass, SelectionPolicy};
pub use progress::{ProgressReporter, SilentReporter};
