//! Batch summary printed when the CLI finishes.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use capyupload_uploader::{UploadOutcome, UploadTask};

/// Per-file line of the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
}

/// Summary of a whole batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    pub succeeded: usize,
    pub failed: usize,
    pub bytes: u64,
    pub elapsed_ms: u64,
}

impl BatchReport {
    /// Pairs outcomes with their tasks by index.
    pub fn new(tasks: &[UploadTask], outcomes: &[UploadOutcome], elapsed: Duration) -> Self {
        let files: Vec<FileReport> = tasks
            .iter()
            .zip(outcomes)
            .map(|(task, outcome)| FileReport {
                path: task.file_path.clone(),
                ok: outcome.is_ok(),
                error: outcome.as_ref().err().map(|e| e.to_string()),
                bytes: outcome.as_ref().ok().map(|sums| sums.len),
            })
            .collect();

        let succeeded = files.iter().filter(|f| f.ok).count();
        Self {
            failed: files.len() - succeeded,
            succeeded,
            bytes: files.iter().filter_map(|f| f.bytes).sum(),
            elapsed_ms: elapsed.as_millis() as u64,
            files,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Human-readable rendering.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for file in &self.files {
            match (&file.error, file.bytes) {
                (None, Some(bytes)) => {
                    let _ = writeln!(out, "  ok    {} ({})", file.path.display(), format_bytes(bytes));
                }
                (None, None) => {
                    let _ = writeln!(out, "  ok    {}", file.path.display());
                }
                (Some(error), _) => {
                    let _ = writeln!(out, "  FAIL  {}: {}", file.path.display(), error);
                }
            }
        }
        let _ = write!(
            out,
            "{} uploaded, {} failed, {} in {:.2}s",
            self.succeeded,
            self.failed,
            format_bytes(self.bytes),
            self.elapsed_ms as f64 / 1000.0
        );
        out
    }
}

/// Format bytes for human-readable display.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}
