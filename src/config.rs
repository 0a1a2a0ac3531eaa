// Analysis configuration
// Key classes and thresholds, loadable from a JSON file

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::extract::ExtractorConfig;
use crate::keys::KeyClasses;
use crate::overlap::DEFAULT_GAP_LIMIT_MS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Settings for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Modifier and main-area key names
    pub keys: KeyClasses,

    /// Release-to-press gaps at or above this are not recorded
    pub max_release_gap_ms: i64,

    /// Longest tap-hold press to next-key release span kept as a chord
    pub max_chord_span_ms: i64,

    /// Fraction used for the "below" column of duration summaries
    pub percentile: f64,

    /// Key whose intersections get their own summary rows
    pub focus_key: String,

    /// Rows kept in frequency tables
    pub top_n: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            keys: KeyClasses::default(),
            max_release_gap_ms: DEFAULT_GAP_LIMIT_MS,
            max_chord_span_ms: ExtractorConfig::default().max_chord_span_ms,
            percentile: 0.99,
            focus_key: "space".to_string(),
            top_n: 50,
        }
    }
}

impl AnalysisConfig {
    pub fn extractor(&self) -> ExtractorConfig {
        ExtractorConfig {
            max_chord_span_ms: self.max_chord_span_ms,
        }
    }

    /// Reject values no analysis could run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.percentile) {
            return Err(ConfigError::Invalid {
                field: "percentile",
                reason: format!("{} is outside [0, 1]", self.percentile),
            });
        }
        if self.max_release_gap_ms <= 0 {
            return Err(ConfigError::Invalid {
                field: "max_release_gap_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.max_chord_span_ms < 0 {
            return Err(ConfigError::Invalid {
                field: "max_chord_span_ms",
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json_bytes(data: &[u8]) -> Result<Self, ConfigError> {
        let config: AnalysisConfig = serde_json::from_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read(path)?;
        let config = Self::from_json_bytes(&data)?;
        log::info!("Loaded analysis config from {}", path.display());
        Ok(config)
    }
}
