use crate::cli::ClassifyArgs;
use crate::error::AppError;
use crate::models::classify_types::{
    default_max_workers, ClassificationJob, InferenceOptions, RunEvent, RunStatus,
};
use crate::models::settings_types::AppSettings;
use crate::services::classifier::model_manager::{ModelLoader, OnnxDeserializer};
use crate::services::classifier::pipeline::ClassificationPipeline;
use crate::services::classifier::scheduler::CancelToken;
use crate::services::export_service;
use crate::services::result_log::{self, ResultLog, CANCELLED_MESSAGE};
use crate::services::settings_service::SettingsStore;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Fill in anything the command line left out from the last run.
pub fn build_job(args: &ClassifyArgs, settings: &AppSettings) -> Result<ClassificationJob, AppError> {
    let last = &settings.paths;
    let pick = |given: &Option<PathBuf>, stored: &Option<PathBuf>, what: &str| {
        given
            .clone()
            .or_else(|| stored.clone())
            .ok_or_else(|| AppError::InvalidJob(format!("no {} given and none remembered", what)))
    };

    let model = pick(&args.model, &last.model, "model file")?;
    let labels = pick(&args.labels, &last.labels, "label file")?;
    let output = pick(&args.output, &last.output, "output folder")?;
    let inputs = if args.inputs.is_empty() {
        last.input_folders.clone()
    } else {
        args.inputs.clone()
    };

    let job = ClassificationJob::new(model, labels, inputs, output)
        .with_batch_size(args.batch_size.unwrap_or(settings.batch_size))
        .with_max_workers(args.workers.unwrap_or_else(default_max_workers))
        .with_inference(InferenceOptions {
            layout: args.layout.into(),
            activation: args.activation(),
            use_gpu: args.gpu,
        });
    job.validate()?;
    Ok(job)
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

/// Hand every event to `on_event` until the run finishes. When `interrupt`
/// resolves the run is asked to stop, and draining continues so the
/// cancellation is still reported.
async fn drain_events<I, F>(
    rx: &mut mpsc::UnboundedReceiver<RunEvent>,
    interrupt: I,
    cancel: &CancelToken,
    mut on_event: F,
) where
    I: Future<Output = io::Result<()>>,
    F: FnMut(&RunEvent),
{
    tokio::pin!(interrupt);
    let mut listening = true;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => {
                    on_event(&event);
                    if event == RunEvent::Finished {
                        break;
                    }
                }
                None => break,
            },
            signal = &mut interrupt, if listening => {
                listening = false;
                match signal {
                    Ok(()) => {
                        warn!("Interrupted, cancelling classification");
                        cancel.cancel();
                    }
                    Err(e) => warn!("Cannot listen for Ctrl+C: {}", e),
                }
            }
        }
    }
}

pub fn classify<S: SettingsStore>(args: ClassifyArgs, store: &S, quiet: bool) -> Result<(), AppError> {
    let mut settings = store.load()?;
    let job = build_job(&args, &settings)?;

    settings.remember_job(&job);
    if let Err(e) = store.save(&settings) {
        warn!("Could not remember paths: {}", e);
    }

    info!(
        "Classifying {} folder(s) into {} (batch size {}, {} workers)",
        job.input_folders.len(),
        job.output_folder.display(),
        job.batch_size,
        job.max_workers
    );

    let loader = ModelLoader::new(OnnxDeserializer::new(job.inference));
    let pipeline = ClassificationPipeline::new(loader);
    let (tx, mut rx) = mpsc::unbounded_channel::<RunEvent>();
    let handle = pipeline.start(job, tx)?;

    let bar = progress_bar(quiet);
    let mut log = ResultLog::new();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(drain_events(
        &mut rx,
        tokio::signal::ctrl_c(),
        &handle.cancel_token(),
        |event| {
            match event {
                RunEvent::Progress { processed, total } => {
                    bar.set_length(*total as u64);
                    bar.set_position(*processed as u64);
                    bar.set_message(result_log::progress_message(*processed, *total));
                }
                RunEvent::Error(message) => bar.suspend(|| eprintln!("{}", message)),
                RunEvent::Result { .. } | RunEvent::Finished => {}
            }
            log.record(event);
        },
    ));
    bar.finish_and_clear();

    let state = handle.join()?;
    match state.status {
        RunStatus::Cancelled => {
            log.push_status(CANCELLED_MESSAGE);
            println!("{}", CANCELLED_MESSAGE);
        }
        RunStatus::Failed => {
            return Err(AppError::Message(
                log.entries()
                    .last()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "Classification failed".to_string()),
            ));
        }
        _ if state.processed > 0 => {
            println!("Classification complete. Processed {} images.", state.processed);
        }
        _ => println!("No images found."),
    }

    if !quiet {
        for entry in log.classified() {
            println!("{}", entry);
        }
    }
    println!("{}", log.summary_line());

    if let Some(csv_path) = args.csv {
        match export_service::export_csv(&log, &csv_path) {
            Ok(rows) => println!("Results exported to {} ({} rows)", csv_path.display(), rows),
            Err(e) => warn!("Error exporting results: {}", e),
        }
    }

    Ok(())
}
