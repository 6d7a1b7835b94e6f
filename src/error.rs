use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Failure to deserialize a model file. The message is kept verbatim so the
/// loader can recognise known defects by their text.
#[derive(Debug, Clone, Error)]
#[error("Failed to load model {}: {message}", .path.display())]
pub struct ModelLoadError {
    pub path: PathBuf,
    pub message: String,
}

impl ModelLoadError {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A single image could not be classified or written. Never fatal to a run.
#[derive(Debug, Clone, Error)]
#[error("Error processing {}: {message}", file_name(.path))]
pub struct ImageProcessingError {
    pub path: PathBuf,
    pub message: String,
}

impl ImageProcessingError {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .to_string()
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),

    #[error("Failed to read label file {}: {message}", .path.display())]
    Labels { path: PathBuf, message: String },

    #[error("Label file {} contains no class names", .0.display())]
    EmptyLabels(PathBuf),

    #[error("Cannot read input folder {}: {message}", .path.display())]
    Discovery { path: PathBuf, message: String },

    #[error("Failed to create output folder {}: {message}", .path.display())]
    OutputFolder { path: PathBuf, message: String },

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error(transparent)]
    Image(#[from] ImageProcessingError),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Invalid color {0:?}")]
    InvalidColor(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Message(String),
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Message(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Message(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Message(msg.to_string())
    }
}
