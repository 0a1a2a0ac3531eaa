// Run tracing
// Append-only JSONL log of analysis stages, stamped with the run id

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// One line of the trace file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Run that wrote the entry; set by the writer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,

    /// RFC 3339 creation time
    pub timestamp: String,

    /// Stage name ("ingest", "classify", "extract", "report")
    pub stage: String,

    /// Progress within the run [0.0, 1.0]
    pub progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    pub fn new(stage: impl Into<String>, progress: f32, message: impl Into<String>) -> Self {
        TraceEntry {
            run_id: None,
            timestamp: Utc::now().to_rfc3339(),
            stage: stage.into(),
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serialize to a JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Appends entries of one run to a JSONL file
pub struct TraceWriter {
    file_path: PathBuf,
    run_id: Uuid,
}

impl TraceWriter {
    /// Writer for a fresh run
    pub fn new(file_path: PathBuf) -> Self {
        Self::for_run(file_path, Uuid::new_v4())
    }

    pub fn for_run(file_path: PathBuf, run_id: Uuid) -> Self {
        TraceWriter { file_path, run_id }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Append one entry, creating the file if needed
    pub fn write(&self, entry: TraceEntry) -> Result<(), TraceError> {
        self.write_batch(vec![entry])
    }

    pub fn write_batch(&self, entries: Vec<TraceEntry>) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        for mut entry in entries {
            entry.run_id = Some(self.run_id);
            file.write_all(entry.to_json_line()?.as_bytes())?;
        }

        file.flush()?;
        Ok(())
    }
}

/// Shorthand for entries of one stage
pub struct TraceBuilder {
    stage: String,
}

impl TraceBuilder {
    pub fn stage(stage: impl Into<String>) -> Self {
        TraceBuilder {
            stage: stage.into(),
        }
    }

    pub fn start(self, message: impl Into<String>) -> TraceEntry {
        TraceEntry::new(self.stage, 0.0, message)
    }

    pub fn progress(self, progress: f32, message: impl Into<String>) -> TraceEntry {
        TraceEntry::new(self.stage, progress, message)
    }

    pub fn complete(self, message: impl Into<String>) -> TraceEntry {
        TraceEntry::new(self.stage, 1.0, message)
    }
}

/// Read every entry of a trace file, optionally keeping only one run
pub fn read_trace_file(path: &Path, run_id: Option<Uuid>) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: TraceEntry = serde_json::from_str(line)?;
        if run_id.is_none() || entry.run_id == run_id {
            entries.push(entry);
        }
    }

    Ok(entries)
}
