// Training example extraction module
// Tap-hold chord template, acceptance filters and training data counts

pub mod extractor;
pub mod template;
pub mod types;

pub use extractor::{Extractor, ExtractorConfig};
pub use template::{tap_hold_template, ChordRole};
pub use types::{RejectReason, TrainingCounts, TrainingExample, TrainingSet};
