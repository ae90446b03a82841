//! Orchestration of reader, transforms and writer.
//!
//! The [`TransformService`] drives one conversion run:
//! read, schema check, input validation, transforms, schema check, output
//! validation, write. Every failure leaves the service as a
//! [`PipelineError`](crate::core::error::PipelineError) naming the stage.

pub mod progress;
pub mod service;
pub mod stage;

pub use progress::{PipelineStage, ProgressCallback, ProgressTracker, ProgressUpdate};
pub use service::{RunSummary, StageTiming, TransformService};
pub use stage::{check_writer_input, Reader, StageOptions, Transform, Writer};
