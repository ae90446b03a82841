//! The transform service: reader → validate → transforms → validate → writer.

use crate::core::error::{FintranError, PipelineError, TransformError, ValidationError};
use crate::core::schema::validate_ir;
use crate::core::table::IrTable;
use crate::pipeline::progress::{PipelineStage, ProgressCallback, ProgressTracker, ProgressUpdate};
use crate::pipeline::stage::{Reader, StageOptions, Transform, Writer};
use crate::validation::pipeline::ValidationPipeline;
use crate::validation::transform::{attach_validation_report, DEFAULT_METADATA_KEY};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// History stage label of the input validation report.
pub const INPUT_VALIDATION_STAGE: &str = "validate_reader_output";

/// History stage label of the output validation report.
pub const OUTPUT_VALIDATION_STAGE: &str = "validate_final_ir";

/// Wall time spent in one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTiming {
    /// The stage
    pub stage: PipelineStage,
    /// Time spent
    pub duration: Duration,
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Rows produced by the reader
    pub rows_read: usize,
    /// Rows handed to the writer (0 when nothing was written)
    pub rows_written: usize,
    /// Number of transforms applied
    pub transforms_applied: usize,
    /// Per-stage timings in execution order
    pub timings: Vec<StageTiming>,
    /// Total wall time
    pub total_duration: Duration,
    /// The final IR
    pub output: IrTable,
}

impl RunSummary {
    /// Time spent in stages with the given step name.
    pub fn time_in(&self, step_name: &str) -> Duration {
        self.timings
            .iter()
            .filter(|t| t.stage.step_name() == step_name)
            .map(|t| t.duration)
            .sum()
    }
}

/// Drives a single conversion run.
///
/// Readers, writers and transforms are trait objects, so the service can be
/// assembled from registries at runtime. The service holds no per-run state
/// and can run any number of conversions.
pub struct TransformService {
    reader: Box<dyn Reader>,
    writer: Box<dyn Writer>,
    transforms: Vec<Box<dyn Transform>>,
    reader_options: StageOptions,
    writer_options: StageOptions,
    input_validation: Option<ValidationPipeline>,
    output_validation: Option<ValidationPipeline>,
    metadata_key: String,
    progress_callback: Option<Arc<ProgressCallback>>,
}

impl fmt::Debug for TransformService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformService")
            .field("reader", &self.reader.name())
            .field("writer", &self.writer.name())
            .field("transforms", &self.transform_names())
            .field("reader_options", &self.reader_options)
            .field("writer_options", &self.writer_options)
            .field("input_validation", &self.input_validation)
            .field("output_validation", &self.output_validation)
            .field("metadata_key", &self.metadata_key)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl TransformService {
    /// Create a service with no transforms and no validation pipelines.
    pub fn new(reader: Box<dyn Reader>, writer: Box<dyn Writer>) -> Self {
        Self {
            reader,
            writer,
            transforms: Vec::new(),
            reader_options: StageOptions::new(),
            writer_options: StageOptions::new(),
            input_validation: None,
            output_validation: None,
            metadata_key: DEFAULT_METADATA_KEY.to_string(),
            progress_callback: None,
        }
    }

    /// Append a transform.
    pub fn with_transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Append a boxed transform.
    pub fn add_transform(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    /// Set reader options.
    pub fn with_reader_options(mut self, options: StageOptions) -> Self {
        self.reader_options = options;
        self
    }

    /// Set writer options.
    pub fn with_writer_options(mut self, options: StageOptions) -> Self {
        self.writer_options = options;
        self
    }

    /// Validate the reader output. An invalid report fails the run.
    pub fn with_input_validation(mut self, pipeline: ValidationPipeline) -> Self {
        self.input_validation = Some(pipeline);
        self
    }

    /// Validate the final IR. An invalid report fails the run.
    pub fn with_output_validation(mut self, pipeline: ValidationPipeline) -> Self {
        self.output_validation = Some(pipeline);
        self
    }

    /// Metadata key for validation history.
    pub fn with_metadata_key(mut self, key: impl Into<String>) -> Self {
        self.metadata_key = key.into();
        self
    }

    /// Set progress callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(Box::new(callback)));
        self
    }

    /// Names of the configured transforms, in order.
    pub fn transform_names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    /// Convert `input` into `output`.
    pub fn run(&self, input: &Path, output: &Path) -> Result<RunSummary, PipelineError> {
        self.execute(input, Some(output))
    }

    /// Run every stage except the write.
    pub fn process(&self, input: &Path) -> Result<RunSummary, PipelineError> {
        self.execute(input, None)
    }

    fn execute(&self, input: &Path, output: Option<&Path>) -> Result<RunSummary, PipelineError> {
        let total_stages = 3 + self.transforms.len() + usize::from(output.is_some());
        let mut tracker = ProgressTracker::new(total_stages);
        if let Some(ref callback) = self.progress_callback {
            tracker = tracker.with_callback(Arc::clone(callback));
        }
        tracker.start();
        log::info!(
            "running {} -> [{}] -> {} on {}",
            self.reader.name(),
            self.transform_names().join(", "),
            self.writer.name(),
            input.display()
        );

        let stage = PipelineStage::Read {
            reader: self.reader.name().to_string(),
        };
        let ir = run_stage(&tracker, stage, || {
            self.reader
                .read(input, &self.reader_options)
                .map_err(FintranError::from)
        })?;
        let rows_read = ir.len();

        let mut ir = run_stage(&tracker, PipelineStage::ValidateInput, || {
            self.check(&ir, self.input_validation.as_ref(), INPUT_VALIDATION_STAGE)
        })?;

        for (index, transform) in self.transforms.iter().enumerate() {
            let stage = PipelineStage::Transform {
                index,
                name: transform.name().to_string(),
            };
            ir = run_stage(&tracker, stage, || apply_transform(transform.as_ref(), &ir))?;
        }

        let ir = run_stage(&tracker, PipelineStage::ValidateOutput, || {
            self.check(&ir, self.output_validation.as_ref(), OUTPUT_VALIDATION_STAGE)
        })?;

        let rows_written = match output {
            Some(output) => {
                let stage = PipelineStage::Write {
                    writer: self.writer.name().to_string(),
                };
                run_stage(&tracker, stage, || {
                    self.writer
                        .write(&ir, output, &self.writer_options)
                        .map(|()| ir.clone())
                        .map_err(FintranError::from)
                })?;
                ir.len()
            }
            None => 0,
        };

        tracker.complete(rows_written);
        Ok(RunSummary {
            rows_read,
            rows_written,
            transforms_applied: self.transforms.len(),
            timings: tracker
                .timings()
                .into_iter()
                .map(|(stage, duration)| StageTiming { stage, duration })
                .collect(),
            total_duration: tracker.elapsed(),
            output: ir,
        })
    }

    /// Schema check, then the optional validation pipeline.
    fn check(
        &self,
        ir: &IrTable,
        pipeline: Option<&ValidationPipeline>,
        stage: &str,
    ) -> Result<IrTable, FintranError> {
        validate_ir(ir)?;

        let Some(pipeline) = pipeline else {
            return Ok(ir.clone());
        };
        let report = pipeline.run(ir)?;
        log::debug!("{}: {}", stage, report.summary());

        if !report.is_valid() {
            return Err(ValidationError::new(
                format!("{} failed: {}", stage, report.summary()),
                report,
            )
            .into());
        }
        Ok(attach_validation_report(ir, &self.metadata_key, stage, report))
    }
}

fn run_stage<F>(
    tracker: &ProgressTracker,
    stage: PipelineStage,
    f: F,
) -> Result<IrTable, PipelineError>
where
    F: FnOnce() -> Result<IrTable, FintranError>,
{
    tracker.stage_started(&stage);
    let start = Instant::now();
    match f() {
        Ok(ir) => {
            tracker.stage_completed(&stage, start.elapsed(), ir.len());
            Ok(ir)
        }
        Err(e) => {
            tracker.stage_failed(&stage, e.to_string());
            Err(PipelineError::new(stage, e))
        }
    }
}

fn apply_transform(transform: &dyn Transform, ir: &IrTable) -> Result<IrTable, FintranError> {
    let out = transform.transform(ir)?;
    if out.is_same_instance(ir) {
        return Err(TransformError::new(
            transform.name(),
            format!(
                "transform '{}' returned its input instead of a new table",
                transform.name()
            ),
        )
        .into());
    }
    Ok(out)
}
