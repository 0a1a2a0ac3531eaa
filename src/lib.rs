// Tapstat - Key press timing analysis
// Module declarations

pub mod config;
pub mod dataset;
pub mod events;
pub mod extract;
pub mod keys;
pub mod overlap;
pub mod pattern;
pub mod pipeline;
pub mod report;
pub mod tally;

pub use config::{AnalysisConfig, ConfigError};
pub use events::{Direction, EventStream, KeyEvent, RemovedMarkers};
pub use extract::{Extractor, TrainingExample, TrainingSet};
pub use keys::{KeyClasses, KeyFlags, KeyId, KeyTable};
pub use overlap::{classify_stream, IntervalClassifier, OverlapStats, StateConsistencyError};
pub use pattern::{MatchResult, PatternMatcher, PatternSpec};
pub use pipeline::{analyze_sessions, analyze_stream, Analysis, AnalysisError, Session};
pub use report::AnalysisReport;
