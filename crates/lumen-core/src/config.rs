//! Explanation configuration
//!
//! Every knob has a default; a JSON file may override any subset of fields.

use crate::attribution::AttributionStrategy;
use crate::detector_client::DetectorClientConfig;
use crate::error::ExplainError;
use crate::prototypes::PrototypeStrategy;
use crate::shapelets::{MotifSelection, ShapeletRanking};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Padding must leave the padded interval shorter than a week
pub const MAX_PADDING_HOURS: usize = 83;
pub const MAX_DETECTOR_RETRIES: u32 = 8;

/// Per-request explanation settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    /// Hours of context on each side of the anomaly (default: 4)
    pub padding_hours: usize,
    /// How prototypes are built (default: weekday mask)
    pub strategy: PrototypeStrategy,
    /// Attribution variant used to pick the responsible sensor (default: point)
    pub attribution: AttributionStrategy,
    /// Motif candidates taken per sensor (default: 12)
    pub motif_count: usize,
    /// Whether motifs are the most typical or the most unusual subsequences
    pub motif_selection: MotifSelection,
    /// How motif candidates are scored against the anomaly window
    pub shapelet_ranking: ShapeletRanking,
    /// Subsequence length of the candidate/anomaly cross join (default: 3)
    pub cross_subsequence_length: usize,
    /// Drop the anomaly's own occurrence from the weekday mask (default: true)
    pub exclude_anomaly_occurrence: bool,
    /// Detector type whose per-sensor errors drive sensor selection (default: 2)
    pub attribution_driven_algo: u32,
    /// Upstream detection service
    pub detector: DetectorClientConfig,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            padding_hours: 4,
            strategy: PrototypeStrategy::default(),
            attribution: AttributionStrategy::default(),
            motif_count: 12,
            motif_selection: MotifSelection::default(),
            shapelet_ranking: ShapeletRanking::default(),
            cross_subsequence_length: 3,
            exclude_anomaly_occurrence: true,
            attribution_driven_algo: 2,
            detector: DetectorClientConfig::default(),
        }
    }
}

impl ExplainConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ExplainError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ExplainError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ExplainError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ExplainError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ExplainError> {
        if self.padding_hours == 0 {
            return Err(ExplainError::InvalidConfig(
                "padding_hours must be positive".into(),
            ));
        }
        if self.padding_hours > MAX_PADDING_HOURS {
            return Err(ExplainError::InvalidConfig(format!(
                "padding_hours must be at most {}",
                MAX_PADDING_HOURS
            )));
        }
        if self.motif_count == 0 {
            return Err(ExplainError::InvalidConfig(
                "motif_count must be positive".into(),
            ));
        }
        if self.cross_subsequence_length == 0 {
            return Err(ExplainError::InvalidConfig(
                "cross_subsequence_length must be positive".into(),
            ));
        }
        if self.detector.timeout_ms == 0 {
            return Err(ExplainError::InvalidConfig(
                "detector.timeout_ms must be positive".into(),
            ));
        }
        if self.detector.max_retries > MAX_DETECTOR_RETRIES {
            return Err(ExplainError::InvalidConfig(format!(
                "detector.max_retries must be at most {}",
                MAX_DETECTOR_RETRIES
            )));
        }
        Ok(())
    }
}
