// Event model module
// Key events, event streams and log ingestion

pub mod ingest;
pub mod types;

pub use ingest::{fingerprint, ingest_log, read_log_file, IngestError, LoadedLog};
pub use types::{Direction, EventStream, KeyEvent, RemovedMarkers};
