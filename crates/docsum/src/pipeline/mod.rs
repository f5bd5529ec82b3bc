//! Per-message orchestration: decode, guard, extract, summarize, persist.

pub mod config;
pub mod context;
pub mod error;
pub mod payload;
pub mod progress;
pub mod runner;
pub mod timeout;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::{PipelineError, Stage};
pub use progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{Outcome, Pipeline};
