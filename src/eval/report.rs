use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::eval::record::QuestionRecord;

#[derive(Debug)]
pub enum ReportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Upload(reqwest::Error),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "report I/O error: {}", e),
            ReportError::Csv(e) => write!(f, "report CSV error: {}", e),
            ReportError::Upload(e) => write!(f, "report upload error: {}", e),
        }
    }
}

impl Error for ReportError {}

impl From<std::io::Error> for ReportError {
    fn from(e: std::io::Error) -> Self {
        ReportError::Io(e)
    }
}

impl From<csv::Error> for ReportError {
    fn from(e: csv::Error) -> Self {
        ReportError::Csv(e)
    }
}

impl From<reqwest::Error> for ReportError {
    fn from(e: reqwest::Error) -> Self {
        ReportError::Upload(e)
    }
}

/// Writes the per-question records as CSV, creating parent directories as
/// needed.
pub fn write_csv(records: &[QuestionRecord], path: &Path) -> Result<(), ReportError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Posts the records plus run metadata to a remote collector. The payload
/// shape is owned by the collector; this end just ships it.
pub async fn upload_results(
    records: &[QuestionRecord],
    url: &str,
    model: &str,
) -> Result<(), ReportError> {
    let payload = serde_json::json!({
        "results": records,
        "runner_type": "remote",
        "model": model,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    let client = reqwest::Client::new();
    let response = client.post(url).json(&payload).send().await?;
    info!("Uploaded {} result(s): {}", records.len(), response.status());
    Ok(())
}
