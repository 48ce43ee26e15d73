use std::path::{Path, PathBuf};

use serde_json::json;

use crate::engine::PipelineOutput;
use crate::persist::{AtomicFileWriter, PersistError};

pub const REPORT_FILENAME: &str = "build-report.json";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Machine-readable summary of a run. Every failed image keeps its URL and error.
pub fn build_report(output: &PipelineOutput) -> serde_json::Value {
    let counts: serde_json::Map<String, serde_json::Value> = output
        .entry_counts()
        .into_iter()
        .map(|(kind, count)| (kind.as_str().to_string(), json!(count)))
        .collect();
    let localization = &output.localization;

    json!({
        "entries": {
            "total": output.entries.len(),
            "api_pages": output.api_pages,
            "guide_pages": output.guide_pages,
            "by_type": counts,
            "failed_pages": output.extraction_failures,
        },
        "images": {
            "total": localization.total,
            "successful": localization.successful,
            "failed": localization.failed,
            "files": localization.files_with_images().collect::<Vec<_>>(),
            "failed_pages": localization.failed_pages,
        }
    })
}

pub fn write_report(dir: &Path, output: &PipelineOutput) -> Result<PathBuf, ReportError> {
    let report = build_report(output);
    let content = serde_json::to_string_pretty(&report)?;
    let writer = AtomicFileWriter::new(dir.to_path_buf());
    Ok(writer.write(REPORT_FILENAME, content.as_bytes())?)
}
