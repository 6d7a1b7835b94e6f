use crate::error::AppError;
use crate::services::result_log::{ResultEntry, ResultLog};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

const CSV_HEADER: &str = "Filename,Class,Confidence";

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Write classified entries as CSV. Status entries are skipped. Returns the
/// number of rows written.
pub fn write_csv<W: Write>(log: &ResultLog, mut out: W) -> Result<usize, AppError> {
    writeln!(out, "{}", CSV_HEADER)?;
    let mut rows = 0;
    for entry in log.classified() {
        if let ResultEntry::Classified {
            class_name,
            confidence,
            ..
        } = entry
        {
            let file_name = entry.file_name().unwrap_or_default();
            writeln!(out, "{},{},{}", quote(&file_name), quote(class_name), confidence)?;
            rows += 1;
        }
    }
    out.flush()?;
    Ok(rows)
}

pub fn export_csv(log: &ResultLog, path: &Path) -> Result<usize, AppError> {
    if log.total_classified() == 0 {
        return Err(AppError::Message("No results to export.".to_string()));
    }
    let file = File::create(path)?;
    let rows = write_csv(log, BufWriter::new(file))?;
    info!("Results exported to {}", path.display());
    Ok(rows)
}
