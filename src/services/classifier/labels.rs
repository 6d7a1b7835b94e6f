use crate::error::AppError;
use std::path::Path;

/// Class names in model-output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet(Vec<String>);

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Result<Self, AppError> {
        if labels.is_empty() {
            return Err(AppError::Message("label set is empty".into()));
        }
        Ok(Self(labels))
    }

    /// One class per line. Lines are trimmed; trailing blank lines are dropped
    /// but interior ones keep their slot so indices stay aligned.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::Labels {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut labels: Vec<String> = content.lines().map(|l| l.trim().to_string()).collect();
        while labels.last().is_some_and(|l| l.is_empty()) {
            labels.pop();
        }

        if labels.is_empty() {
            return Err(AppError::EmptyLabels(path.to_path_buf()));
        }
        Ok(Self(labels))
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_trimmed_lines_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "cat \r\n  dog\nbird\n\n\n").unwrap();

        let labels = LabelSet::load(&path).unwrap();
        assert_eq!(labels.iter().collect::<Vec<_>>(), vec!["cat", "dog", "bird"]);
        assert_eq!(labels.get(1), Some("dog"));
        assert_eq!(labels.get(3), None);
    }

    #[test]
    fn interior_blank_lines_keep_their_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "a\n\nc\n").unwrap();

        let labels = LabelSet::load(&path).unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.get(2), Some("c"));
    }

    #[test]
    fn empty_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "\n  \n").unwrap();

        assert!(matches!(LabelSet::load(&path), Err(AppError::EmptyLabels(_))));
    }

    #[test]
    fn missing_file_is_rejected() {
        let dir = tempdir().unwrap();
        let result = LabelSet::load(&dir.path().join("nope.txt"));
        assert!(matches!(result, Err(AppError::Labels { .. })));
    }
}
