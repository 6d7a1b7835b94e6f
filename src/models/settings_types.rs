use crate::models::classify_types::{ClassificationJob, DEFAULT_BATCH_SIZE};
use crate::models::theme_types::ThemeConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MAX_RECENT_PATHS: usize = 10;

/// Most-recent-first list of paths the user has worked with.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentPaths(Vec<String>);

impl RecentPaths {
    pub fn push(&mut self, path: &str) {
        if path.is_empty() {
            return;
        }
        self.0.retain(|p| p != path);
        self.0.insert(0, path.to_string());
        self.0.truncate(MAX_RECENT_PATHS);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LastPaths {
    pub model: Option<PathBuf>,
    pub labels: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub input_folders: Vec<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub batch_size: usize,
    pub paths: LastPaths,
    pub recent_paths: RecentPaths,
    pub theme: ThemeConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            paths: LastPaths::default(),
            recent_paths: RecentPaths::default(),
            theme: ThemeConfig::default(),
        }
    }
}

impl AppSettings {
    /// Remember the paths of a job that is about to start.
    pub fn remember_job(&mut self, job: &ClassificationJob) {
        self.batch_size = job.batch_size;
        self.paths.model = Some(job.model_path.clone());
        self.paths.labels = Some(job.labels_path.clone());
        self.paths.output = Some(job.output_folder.clone());
        self.paths.input_folders = job.input_folders.clone();

        self.recent_paths.push(&path_text(&job.model_path));
        self.recent_paths.push(&path_text(&job.labels_path));
        self.recent_paths.push(&path_text(&job.output_folder));
        for folder in &job.input_folders {
            self.recent_paths.push(&path_text(folder));
        }
    }
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_paths_are_most_recent_first_and_unique() {
        let mut recent = RecentPaths::default();
        recent.push("/a");
        recent.push("/b");
        recent.push("/a");
        assert_eq!(recent.iter().collect::<Vec<_>>(), vec!["/a", "/b"]);
    }

    #[test]
    fn recent_paths_keep_ten_entries() {
        let mut recent = RecentPaths::default();
        for i in 0..15 {
            recent.push(&format!("/p{i}"));
        }
        assert_eq!(recent.len(), MAX_RECENT_PATHS);
        assert_eq!(recent.iter().next(), Some("/p14"));
        assert_eq!(recent.iter().last(), Some("/p5"));
    }

    #[test]
    fn empty_paths_are_ignored() {
        let mut recent = RecentPaths::default();
        recent.push("");
        assert!(recent.is_empty());
    }

    #[test]
    fn remember_job_records_last_paths() {
        let job = ClassificationJob::new(
            "/models/m.onnx",
            "/models/labels.txt",
            vec![PathBuf::from("/photos/a"), PathBuf::from("/photos/b")],
            "/sorted",
        )
        .with_batch_size(32);
        let mut settings = AppSettings::default();
        settings.remember_job(&job);

        assert_eq!(settings.batch_size, 32);
        assert_eq!(settings.paths.model.as_deref(), Some(Path::new("/models/m.onnx")));
        assert_eq!(settings.paths.input_folders.len(), 2);
        assert_eq!(settings.recent_paths.iter().next(), Some("/photos/b"));
        assert_eq!(settings.recent_paths.len(), 5);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: AppSettings = serde_json::from_str(r#"{"batch_size": 8}"#).unwrap();
        assert_eq!(settings.batch_size, 8);
        assert_eq!(settings.theme, ThemeConfig::default());
        assert!(settings.recent_paths.is_empty());
    }
}
