//! Progress tracking for conversion runs.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A step of the transform service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Reading the input
    Read { reader: String },
    /// Schema check and validation of the reader output
    ValidateInput,
    /// Applying one transform
    Transform { index: usize, name: String },
    /// Schema check and validation of the final IR
    ValidateOutput,
    /// Writing the output
    Write { writer: String },
}

impl PipelineStage {
    /// Short step name without component details.
    pub fn step_name(&self) -> &'static str {
        match self {
            PipelineStage::Read { .. } => "read",
            PipelineStage::ValidateInput => "validate_input",
            PipelineStage::Transform { .. } => "transform",
            PipelineStage::ValidateOutput => "validate_output",
            PipelineStage::Write { .. } => "write",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Read { reader } => write!(f, "read ({})", reader),
            PipelineStage::ValidateInput => write!(f, "validate_input"),
            PipelineStage::Transform { index, name } => {
                write!(f, "transform {} ({})", index, name)
            }
            PipelineStage::ValidateOutput => write!(f, "validate_output"),
            PipelineStage::Write { writer } => write!(f, "write ({})", writer),
        }
    }
}

/// A progress update event.
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    /// The run has started.
    Started { total_stages: usize },
    /// A stage has started.
    StageStarted {
        stage: PipelineStage,
        index: usize,
        total: usize,
    },
    /// A stage has completed.
    StageCompleted {
        stage: PipelineStage,
        duration_ms: u64,
        rows: usize,
    },
    /// A stage failed; the run stops here.
    StageFailed { stage: PipelineStage, message: String },
    /// The run has completed.
    Completed {
        total_duration_ms: u64,
        rows_written: usize,
    },
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Tracks stage progress and timings of one run.
pub struct ProgressTracker {
    total_stages: usize,
    completed_stages: AtomicU64,
    start_time: Instant,
    callback: Option<Arc<ProgressCallback>>,
    timings: Mutex<Vec<(PipelineStage, Duration)>>,
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new(total_stages: usize) -> Self {
        Self {
            total_stages,
            completed_stages: AtomicU64::new(0),
            start_time: Instant::now(),
            callback: None,
            timings: Mutex::new(Vec::new()),
        }
    }

    /// Set a callback for progress updates.
    pub fn with_callback(mut self, callback: Arc<ProgressCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Start tracking.
    pub fn start(&mut self) {
        self.start_time = Instant::now();
        self.send_update(ProgressUpdate::Started {
            total_stages: self.total_stages,
        });
    }

    /// Report that a stage has started.
    pub fn stage_started(&self, stage: &PipelineStage) {
        log::info!("stage {} started", stage);
        self.send_update(ProgressUpdate::StageStarted {
            stage: stage.clone(),
            index: self.completed_stages.load(Ordering::Relaxed) as usize,
            total: self.total_stages,
        });
    }

    /// Report that a stage has completed.
    pub fn stage_completed(&self, stage: &PipelineStage, duration: Duration, rows: usize) {
        self.completed_stages.fetch_add(1, Ordering::Relaxed);
        self.timings.lock().push((stage.clone(), duration));
        log::info!(
            "stage {} completed in {} ms ({} rows)",
            stage,
            duration.as_millis(),
            rows
        );
        self.send_update(ProgressUpdate::StageCompleted {
            stage: stage.clone(),
            duration_ms: duration.as_millis() as u64,
            rows,
        });
    }

    /// Report a failed stage.
    pub fn stage_failed(&self, stage: &PipelineStage, message: String) {
        log::warn!("stage {} failed: {}", stage, message);
        self.send_update(ProgressUpdate::StageFailed {
            stage: stage.clone(),
            message,
        });
    }

    /// Complete tracking.
    pub fn complete(&self, rows_written: usize) {
        self.send_update(ProgressUpdate::Completed {
            total_duration_ms: self.elapsed().as_millis() as u64,
            rows_written,
        });
    }

    /// Time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get current progress percentage.
    pub fn progress_percent(&self) -> f32 {
        if self.total_stages == 0 {
            return 100.0;
        }
        let completed = self.completed_stages.load(Ordering::Relaxed);
        (completed as f32 / self.total_stages as f32) * 100.0
    }

    /// Timings of completed stages, in completion order.
    pub fn timings(&self) -> Vec<(PipelineStage, Duration)> {
        self.timings.lock().clone()
    }

    fn send_update(&self, update: ProgressUpdate) {
        if let Some(ref callback) = self.callback {
            callback(update);
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_progress_calculation() {
        let tracker = ProgressTracker::new(4);
        assert_eq!(tracker.progress_percent(), 0.0);

        tracker.stage_completed(&PipelineStage::ValidateInput, Duration::from_millis(3), 10);
        tracker.stage_completed(&PipelineStage::ValidateOutput, Duration::from_millis(1), 10);
        assert_eq!(tracker.progress_percent(), 50.0);
        assert_eq!(tracker.timings().len(), 2);

        assert_eq!(ProgressTracker::default().progress_percent(), 100.0);
    }

    #[test]
    fn test_callback_invoked() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();
        let callback: ProgressCallback = Box::new(move |_| {
            call_count_clone.fetch_add(1, Ordering::Relaxed);
        });

        let mut tracker = ProgressTracker::new(1).with_callback(Arc::new(callback));
        let stage = PipelineStage::Read {
            reader: "csv".to_string(),
        };
        tracker.start();
        tracker.stage_started(&stage);
        tracker.stage_completed(&stage, Duration::ZERO, 0);
        tracker.complete(0);

        assert_eq!(call_count.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_stage_display() {
        let stage = PipelineStage::Transform {
            index: 1,
            name: "normalize_currency".to_string(),
        };
        assert_eq!(stage.to_string(), "transform 1 (normalize_currency)");
        assert_eq!(stage.step_name(), "transform");
        assert_eq!(
            PipelineStage::Write {
                writer: "csv".to_string()
            }
            .to_string(),
            "write (csv)"
        );
    }
}
