use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const DEFAULT_BATCH_SIZE: usize = 16;
pub const MAX_WORKERS: usize = 8;
pub const MODEL_INPUT_SIZE: u32 = 224;

/// Worker pool size: available parallelism (4 if unknown), capped at 8.
pub fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .min(MAX_WORKERS)
}

/// Memory order of the model input tensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, H, W, 3]`, the layout of Keras exports.
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`
    Nchw,
}

/// What the model's output vector holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputActivation {
    #[default]
    Probabilities,
    Logits,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceOptions {
    pub layout: TensorLayout,
    pub activation: OutputActivation,
    pub use_gpu: bool,
}

/// Everything a run needs. Built by the caller, frozen once the run starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationJob {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    pub input_folders: Vec<PathBuf>,
    pub output_folder: PathBuf,
    pub batch_size: usize,
    pub max_workers: usize,
    pub inference: InferenceOptions,
}

impl ClassificationJob {
    pub fn new(
        model_path: impl Into<PathBuf>,
        labels_path: impl Into<PathBuf>,
        input_folders: Vec<PathBuf>,
        output_folder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            model_path: model_path.into(),
            labels_path: labels_path.into(),
            input_folders,
            output_folder: output_folder.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_workers: default_max_workers(),
            inference: InferenceOptions::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_inference(mut self, inference: InferenceOptions) -> Self {
        self.inference = inference;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_path.as_os_str().is_empty() {
            return Err(AppError::InvalidJob("no model file selected".into()));
        }
        if self.labels_path.as_os_str().is_empty() {
            return Err(AppError::InvalidJob("no label file selected".into()));
        }
        if self.input_folders.is_empty()
            || self.input_folders.iter().any(|f| f.as_os_str().is_empty())
        {
            return Err(AppError::InvalidJob("select at least one input folder".into()));
        }
        if self.output_folder.as_os_str().is_empty() {
            return Err(AppError::InvalidJob("no output folder selected".into()));
        }
        if self.batch_size == 0 {
            return Err(AppError::InvalidJob("batch size must be positive".into()));
        }
        if self.max_workers == 0 {
            return Err(AppError::InvalidJob("worker count must be positive".into()));
        }
        Ok(())
    }
}

/// One successfully classified image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationRecord {
    pub source_path: PathBuf,
    pub class_name: String,
    pub confidence: f32,
    pub output_path: PathBuf,
}

impl ClassificationRecord {
    pub fn confidence_label(&self) -> String {
        format_confidence(self.confidence)
    }
}

pub fn format_confidence(confidence: f32) -> String {
    format!("{:.2}", confidence)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Counters for one run. Only the orchestrator thread mutates this.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunState {
    pub status: RunStatus,
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub class_counts: BTreeMap<String, usize>,
}

impl RunState {
    pub fn record_success(&mut self, class_name: &str) {
        self.processed += 1;
        self.succeeded += 1;
        *self.class_counts.entry(class_name.to_string()).or_insert(0) += 1;
    }

    pub fn record_failure(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }
}

/// Messages the pipeline sends to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RunEvent {
    Progress {
        processed: usize,
        total: usize,
    },
    Result {
        path: String,
        class_name: String,
        confidence: String,
    },
    Error(String),
    Finished,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_rounded_to_two_places() {
        assert_eq!(format_confidence(0.8675), "0.87");
        assert_eq!(format_confidence(1.0), "1.00");
        assert_eq!(format_confidence(0.004), "0.00");
    }

    #[test]
    fn worker_default_is_bounded() {
        let workers = default_max_workers();
        assert!(workers >= 1 && workers <= MAX_WORKERS);
    }

    #[test]
    fn validate_rejects_incomplete_jobs() {
        let job = ClassificationJob::new("m.onnx", "labels.txt", vec![], "out");
        assert!(matches!(job.validate(), Err(AppError::InvalidJob(_))));

        let job = ClassificationJob::new("m.onnx", "labels.txt", vec!["in".into()], "out")
            .with_batch_size(0);
        assert!(job.validate().is_err());

        let job = ClassificationJob::new("m.onnx", "labels.txt", vec!["in".into()], "out");
        assert!(job.validate().is_ok());
        assert_eq!(job.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn run_state_counts_failures_as_processed() {
        let mut state = RunState::default();
        state.record_success("cat");
        state.record_success("cat");
        state.record_failure();
        assert_eq!(state.processed, 3);
        assert_eq!(state.succeeded, 2);
        assert_eq!(state.failed, 1);
        assert_eq!(state.class_counts["cat"], 2);
    }
}
