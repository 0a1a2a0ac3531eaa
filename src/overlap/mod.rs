// Interval overlap module
// Classifies key releases as zero-overlap, overlap or wrap and aggregates timing

pub mod classifier;
pub mod types;

pub use classifier::{classify_stream, IntervalClassifier, DEFAULT_GAP_LIMIT_MS};
pub use types::{
    AnalysisWarning, ByModifier, IntersectionEntry, IntersectionTable, ModPair, OverlapStats,
    PairKey, Relation, ReleaseOutcome, StateConsistencyError, NO_OVERLAP_RATIO,
};
