// Analysis pipeline
// Runs classification and extraction per session and merges the results

pub mod trace;

pub use trace::{read_trace_file, TraceBuilder, TraceEntry, TraceError, TraceWriter};

use std::path::Path;
use thiserror::Error;

use crate::config::{AnalysisConfig, ConfigError};
use crate::dataset::DatasetError;
use crate::events::{read_log_file, EventStream, IngestError};
use crate::extract::{Extractor, TrainingSet};
use crate::keys::KeyTable;
use crate::overlap::{classify_stream, OverlapStats, StateConsistencyError};
use crate::pattern::PatternError;
use crate::report::{AnalysisReport, SourceSummary};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Inconsistent key state: {0}")]
    State(#[from] StateConsistencyError),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),
}

/// Classifier and extractor output for one or more sessions
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub overlap: OverlapStats,
    pub training: TrainingSet,
}

impl Analysis {
    pub fn merge(&mut self, other: &Analysis) {
        self.overlap.merge(&other.overlap);
        self.training.merge(&other.training);
    }

    pub fn report(&self, keys: &KeyTable, config: &AnalysisConfig) -> AnalysisReport {
        AnalysisReport::build(keys, &self.overlap, &self.training, config)
    }
}

/// One recorded typing session
#[derive(Debug, Clone)]
pub struct Session {
    pub name: String,
    pub sha256: String,
    pub stream: EventStream,
}

impl Session {
    /// Load a session log, interning its keys into the shared table
    pub fn load(path: &Path, keys: &mut KeyTable) -> Result<Self, IngestError> {
        let loaded = read_log_file(path, keys)?;
        Ok(Session {
            name: path.display().to_string(),
            sha256: loaded.sha256,
            stream: loaded.stream,
        })
    }
}

/// Merged output of a batch plus what happened to each session
#[derive(Debug, Clone, Default)]
pub struct BatchAnalysis {
    pub analysis: Analysis,
    pub sources: Vec<SourceSummary>,
}

impl BatchAnalysis {
    pub fn skipped(&self) -> usize {
        self.sources.iter().filter(|s| s.skipped.is_some()).count()
    }

    pub fn report(&self, keys: &KeyTable, config: &AnalysisConfig) -> AnalysisReport {
        self.analysis
            .report(keys, config)
            .with_sources(self.sources.clone())
    }
}

/// Classify one stream and extract its training examples
///
/// A key state violation aborts the stream before anything is extracted.
pub fn analyze_stream(
    keys: &KeyTable,
    stream: &EventStream,
    config: &AnalysisConfig,
) -> Result<Analysis, AnalysisError> {
    config.validate()?;
    let flags = config.keys.resolve(keys);

    let overlap = classify_stream(keys, flags.clone(), config.max_release_gap_ms, stream)?;
    let training = Extractor::new(flags, config.extractor())?.extract(stream);

    Ok(Analysis { overlap, training })
}

/// Analyze sessions independently and merge them
///
/// Sessions failing with a key state violation are logged and skipped;
/// any other error stops the batch.
pub fn analyze_sessions(
    keys: &KeyTable,
    sessions: &[Session],
    config: &AnalysisConfig,
    trace: Option<&TraceWriter>,
) -> Result<BatchAnalysis, AnalysisError> {
    let mut batch = BatchAnalysis::default();
    let total = sessions.len().max(1) as f32;

    if let Some(writer) = trace {
        writer.write(
            TraceBuilder::stage("analyze")
                .start(format!("Analyzing {} sessions", sessions.len())),
        )?;
    }

    for (i, session) in sessions.iter().enumerate() {
        log::info!("Analyzing {} ({} events)", session.name, session.stream.len());

        let mut source = SourceSummary {
            path: session.name.clone(),
            sha256: session.sha256.clone(),
            events: session.stream.len(),
            skipped: None,
        };

        match analyze_stream(keys, &session.stream, config) {
            Ok(analysis) => {
                log::info!(
                    "{}: {} presses, {} training examples",
                    session.name,
                    analysis.overlap.total_presses(),
                    analysis.training.len()
                );
                batch.analysis.merge(&analysis);
            }
            Err(AnalysisError::State(err)) => {
                log::warn!("Skipping {}: {}", session.name, err);
                source.skipped = Some(err.to_string());
            }
            Err(err) => return Err(err),
        }

        if let Some(writer) = trace {
            let entry = TraceBuilder::stage("analyze")
                .progress((i + 1) as f32 / total, format!("Finished {}", session.name))
                .with_data(serde_json::json!({
                    "events": source.events,
                    "sha256": source.sha256,
                    "skipped": source.skipped,
                }));
            writer.write(entry)?;
        }

        batch.sources.push(source);
    }

    log::info!(
        "Batch done: {} sessions, {} skipped, {} training examples",
        sessions.len(),
        batch.skipped(),
        batch.analysis.training.len()
    );

    if let Some(writer) = trace {
        writer.write(TraceBuilder::stage("analyze").complete("Batch complete"))?;
    }

    Ok(batch)
}
