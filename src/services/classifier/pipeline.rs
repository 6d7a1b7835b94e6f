use crate::error::{AppError, ImageProcessingError};
use crate::models::classify_types::{
    ClassificationJob, ClassificationRecord, OutputActivation, RunEvent, RunState, RunStatus,
};
use crate::services::classifier::inference;
use crate::services::classifier::labels::LabelSet;
use crate::services::classifier::model_manager::{Classifier, ModelDeserializer, ModelLoader};
use crate::services::classifier::scheduler::{
    batch_count, BatchObserver, BatchScheduler, CancelToken,
};
use crate::services::fs_service;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

/// Where a run reports to. `on_finished` is called exactly once per run,
/// after every other event.
pub trait EventSink {
    fn on_progress(&mut self, processed: usize, total: usize);
    fn on_result(&mut self, path: &str, class_name: &str, confidence: &str);
    fn on_error(&mut self, message: &str);
    fn on_finished(&mut self);
}

impl EventSink for UnboundedSender<RunEvent> {
    fn on_progress(&mut self, processed: usize, total: usize) {
        let _ = self.send(RunEvent::Progress { processed, total });
    }

    fn on_result(&mut self, path: &str, class_name: &str, confidence: &str) {
        let _ = self.send(RunEvent::Result {
            path: path.to_string(),
            class_name: class_name.to_string(),
            confidence: confidence.to_string(),
        });
    }

    fn on_error(&mut self, message: &str) {
        let _ = self.send(RunEvent::Error(message.to_string()));
    }

    fn on_finished(&mut self) {
        let _ = self.send(RunEvent::Finished);
    }
}

impl EventSink for Vec<RunEvent> {
    fn on_progress(&mut self, processed: usize, total: usize) {
        self.push(RunEvent::Progress { processed, total });
    }

    fn on_result(&mut self, path: &str, class_name: &str, confidence: &str) {
        self.push(RunEvent::Result {
            path: path.to_string(),
            class_name: class_name.to_string(),
            confidence: confidence.to_string(),
        });
    }

    fn on_error(&mut self, message: &str) {
        self.push(RunEvent::Error(message.to_string()));
    }

    fn on_finished(&mut self) {
        self.push(RunEvent::Finished);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Classify one image, turning a panic in the model or decoder into an
/// error for that image so the run keeps going.
fn classify_guarded(
    path: &Path,
    model: &dyn Classifier,
    labels: &LabelSet,
    activation: OutputActivation,
    output_root: &Path,
) -> Result<ClassificationRecord, ImageProcessingError> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        inference::classify_image(path, model, labels, activation, output_root)
    }))
    .unwrap_or_else(|payload| {
        Err(ImageProcessingError::new(
            path,
            format!("Classification panicked: {}", panic_message(payload)),
        ))
    })
}

/// Handle to a run started with `ClassificationPipeline::start`.
pub struct RunHandle {
    cancel: CancelToken,
    thread: JoinHandle<RunState>,
}

impl RunHandle {
    /// Ask the run to stop at the next completion or batch boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn join(self) -> Result<RunState, AppError> {
        self.thread
            .join()
            .map_err(|_| AppError::Message("Classification thread panicked".to_string()))
    }
}

/// Feeds scheduler outcomes into the run state and the caller's sink.
struct RunReporter<'a, S: EventSink> {
    sink: &'a mut S,
    state: &'a mut RunState,
}

impl<S: EventSink> BatchObserver<ClassificationRecord, ImageProcessingError> for RunReporter<'_, S> {
    fn on_result(&mut self, record: ClassificationRecord) {
        self.state.record_success(&record.class_name);
        self.sink.on_result(
            &record.source_path.to_string_lossy(),
            &record.class_name,
            &record.confidence_label(),
        );
    }

    fn on_error(&mut self, error: ImageProcessingError) {
        self.state.record_failure();
        warn!("{}", error);
        self.sink.on_error(&error.to_string());
    }

    fn on_progress(&mut self, processed: usize, total: usize) {
        self.sink.on_progress(processed, total);
    }
}

pub struct ClassificationPipeline<D> {
    loader: Arc<ModelLoader<D>>,
}

impl<D> Clone for ClassificationPipeline<D> {
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
        }
    }
}

impl<D: ModelDeserializer + 'static> ClassificationPipeline<D> {
    pub fn new(loader: ModelLoader<D>) -> Self {
        Self {
            loader: Arc::new(loader),
        }
    }

    /// Run `job` on a background thread, reporting to `sink`.
    pub fn start<S>(&self, job: ClassificationJob, mut sink: S) -> Result<RunHandle, AppError>
    where
        S: EventSink + Send + 'static,
    {
        let cancel = CancelToken::new();
        let pipeline = self.clone();
        let token = cancel.clone();

        let thread = std::thread::Builder::new()
            .name("classification".to_string())
            .spawn(move || pipeline.run(&job, &mut sink, &token))?;

        Ok(RunHandle { cancel, thread })
    }

    /// Run `job` on the calling thread. Always ends with exactly one
    /// `on_finished`, including after a setup failure.
    pub fn run<S: EventSink>(&self, job: &ClassificationJob, sink: &mut S, cancel: &CancelToken) -> RunState {
        let started = Instant::now();
        let mut state = RunState {
            status: RunStatus::Running,
            ..Default::default()
        };

        match self.execute(job, sink, cancel, &mut state) {
            Ok(cancelled) => {
                state.status = if cancelled {
                    RunStatus::Cancelled
                } else {
                    RunStatus::Completed
                };
                info!(
                    "Classification {} after {:.1}s: {}/{} processed, {} failed",
                    if cancelled { "cancelled" } else { "complete" },
                    started.elapsed().as_secs_f64(),
                    state.processed,
                    state.total,
                    state.failed
                );
            }
            Err(e) => {
                error!("Classification setup failed: {}", e);
                state.status = RunStatus::Failed;
                sink.on_error(&format!("Error in classification setup: {}", e));
            }
        }

        sink.on_finished();
        state
    }

    fn execute<S: EventSink>(
        &self,
        job: &ClassificationJob,
        sink: &mut S,
        cancel: &CancelToken,
        state: &mut RunState,
    ) -> Result<bool, AppError> {
        job.validate()?;

        let model = self.loader.load(&job.model_path)?;
        let labels = LabelSet::load(&job.labels_path)?;
        info!("Loaded {} labels from {}", labels.len(), job.labels_path.display());

        let images = fs_service::discover_images(&job.input_folders)?;
        state.total = images.len();
        info!(
            "Found {} images in {} folder(s)",
            images.len(),
            job.input_folders.len()
        );

        // Workers never create directories.
        for class_name in labels.iter() {
            let class_folder = job.output_folder.join(class_name);
            std::fs::create_dir_all(&class_folder).map_err(|e| AppError::OutputFolder {
                path: class_folder.clone(),
                message: e.to_string(),
            })?;
        }

        let model: &dyn Classifier = &model;
        let activation = job.inference.activation;
        let output_root = job.output_folder.as_path();

        let mut reporter = RunReporter { sink, state };
        let report = BatchScheduler::new(job.batch_size, job.max_workers).run(
            &images,
            |path| classify_guarded(path, model, &labels, activation, output_root),
            cancel,
            &mut reporter,
        )?;

        if report.cancelled {
            info!(
                "Stopped after {} of {} batches",
                report.batches_started,
                batch_count(report.total, job.batch_size)
            );
        }
        Ok(report.cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelLoadError;
    use crate::services::classifier::model_manager::LayerShim;
    use ndarray::Array4;
    use std::path::Path;

    struct Always(usize);

    impl Classifier for Always {
        fn predict(&self, _input: Array4<f32>) -> Result<Vec<f32>, AppError> {
            let mut out = vec![0.0; 3];
            out[self.0] = 0.9;
            Ok(out)
        }
    }

    struct Stub;

    impl ModelDeserializer for Stub {
        type Model = Always;
        fn deserialize(&self, path: &Path, _shims: &[LayerShim]) -> Result<Always, ModelLoadError> {
            if path.exists() {
                Ok(Always(1))
            } else {
                Err(ModelLoadError::new(path, "no such model"))
            }
        }
    }

    #[test]
    fn invalid_job_fails_and_still_finishes() {
        let pipeline = ClassificationPipeline::new(ModelLoader::new(Stub));
        let job = ClassificationJob::new("m", "l", vec![], "o");
        let mut events = Vec::new();

        let state = pipeline.run(&job, &mut events, &CancelToken::new());

        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], RunEvent::Error(m) if m.starts_with("Error in classification setup")));
        assert_eq!(events[1], RunEvent::Finished);
    }

    #[test]
    fn missing_model_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let job = ClassificationJob::new(
            dir.path().join("missing.onnx"),
            dir.path().join("labels.txt"),
            vec![dir.path().to_path_buf()],
            dir.path().join("out"),
        );
        let mut events = Vec::new();
        let state = ClassificationPipeline::new(ModelLoader::new(Stub)).run(
            &job,
            &mut events,
            &CancelToken::new(),
        );

        assert_eq!(state.status, RunStatus::Failed);
        assert!(matches!(&events[0], RunEvent::Error(m) if m.contains("no such model")));
        assert_eq!(events.last(), Some(&RunEvent::Finished));
    }
}
