use crate::models::classify_types::RunEvent;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

pub const CANCELLED_MESSAGE: &str = "Classification canceled by user.";

#[derive(Debug, Clone, PartialEq)]
pub enum ResultEntry {
    Classified {
        path: String,
        class_name: String,
        confidence: String,
    },
    /// Errors and other notices shown inline with the results.
    Status(String),
}

impl ResultEntry {
    pub fn file_name(&self) -> Option<String> {
        match self {
            ResultEntry::Classified { path, .. } => Some(
                Path::new(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.clone()),
            ),
            ResultEntry::Status(_) => None,
        }
    }
}

impl fmt::Display for ResultEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultEntry::Classified {
                class_name,
                confidence,
                ..
            } => write!(
                f,
                "{} → {} (confidence: {})",
                self.file_name().unwrap_or_default(),
                class_name,
                confidence
            ),
            ResultEntry::Status(message) => f.write_str(message),
        }
    }
}

/// Everything a run reported, in arrival order, plus per-class tallies.
#[derive(Debug, Clone, Default)]
pub struct ResultLog {
    entries: Vec<ResultEntry>,
    class_counts: BTreeMap<String, usize>,
    classified: usize,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one pipeline event into the log. Progress and finish events carry
    /// nothing to keep.
    pub fn record(&mut self, event: &RunEvent) {
        match event {
            RunEvent::Result {
                path,
                class_name,
                confidence,
            } => {
                *self.class_counts.entry(class_name.clone()).or_insert(0) += 1;
                self.classified += 1;
                self.entries.push(ResultEntry::Classified {
                    path: path.clone(),
                    class_name: class_name.clone(),
                    confidence: confidence.clone(),
                });
            }
            RunEvent::Error(message) => self.push_status(message.clone()),
            RunEvent::Progress { .. } | RunEvent::Finished => {}
        }
    }

    pub fn push_status(&mut self, message: impl Into<String>) {
        self.entries.push(ResultEntry::Status(message.into()));
    }

    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    pub fn classified(&self) -> impl Iterator<Item = &ResultEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e, ResultEntry::Classified { .. }))
    }

    pub fn total_classified(&self) -> usize {
        self.classified
    }

    /// `Total processed: N images | Classes: a: 3 (60.0%), b: 2 (40.0%)`.
    /// Classes are ordered by count, largest first, then by name.
    pub fn summary_line(&self) -> String {
        if self.classified == 0 {
            return "No results yet".to_string();
        }

        let mut counts: Vec<(&String, &usize)> = self.class_counts.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        let classes = counts
            .iter()
            .map(|(name, count)| {
                let pct = **count as f64 / self.classified as f64 * 100.0;
                format!("{}: {} ({:.1}%)", name, count, pct)
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "Total processed: {} images | Classes: {}",
            self.classified, classes
        )
    }
}

pub fn progress_message(processed: usize, total: usize) -> String {
    let pct = if total == 0 { 0 } else { processed * 100 / total };
    format!("Processing images: {}/{} ({}%)", processed, total, pct)
}
