//! Shapelet/Motif Finder
//!
//! Picks two historical subsequences to show beside an anomaly:
//!
//! 1. Self-join matrix profile of every sensor at the prototype length.
//! 2. The `motif_count` smallest (typical) or largest (discord) profile
//!    entries of each sensor become candidates.
//! 3. Candidates are scored against the padded anomaly window of the
//!    responsible sensor and the two highest scores win.

use crate::config::ExplainConfig;
use crate::dataset::AnomalyDataset;
use crate::error::ExplainError;
use crate::matrix_profile::{ab_join, finite_sum, self_join};
use crate::ranking::{largest_k, smallest_k};
use crate::stats;
use crate::time_grid::{Window, padded_window};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which end of each sensor's matrix profile supplies candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotifSelection {
    /// Smallest nearest-neighbor distances, the most repeated shapes
    #[default]
    Typical,
    /// Largest nearest-neighbor distances, the most unusual shapes
    Discord,
}

/// How a candidate is compared with the anomaly window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeletRanking {
    /// Sum of the finite AB-join distances at the cross subsequence length
    #[default]
    CrossProfile,
    /// Euclidean distance to the anomaly window with its core replaced by the window mean
    MeanSubstitutedEuclidean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeletSettings {
    pub motif_count: usize,
    pub selection: MotifSelection,
    pub ranking: ShapeletRanking,
    pub cross_subsequence_length: usize,
}

impl Default for ShapeletSettings {
    fn default() -> Self {
        Self::from(&ExplainConfig::default())
    }
}

impl From<&ExplainConfig> for ShapeletSettings {
    fn from(config: &ExplainConfig) -> Self {
        Self {
            motif_count: config.motif_count,
            selection: config.motif_selection,
            ranking: config.shapelet_ranking,
            cross_subsequence_length: config.cross_subsequence_length,
        }
    }
}

/// One historical subsequence considered as a prototype
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub sensor: usize,
    pub start: usize,
    /// Matrix-profile value that made this subsequence a candidate
    pub motif_distance: f64,
    pub window: Window,
}

/// A candidate together with its distance to the anomaly window
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shapelets {
    pub first: ScoredCandidate,
    pub second: ScoredCandidate,
    pub anomaly: Window,
    pub candidates_considered: usize,
}

/// Collect motif candidates from every sensor long enough for `window_length`
pub fn motif_candidates(
    dataset: &AnomalyDataset,
    window_length: usize,
    settings: &ShapeletSettings,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for sensor in 0..dataset.sensor_count() {
        let series = dataset.series(sensor);
        let Some(mp) = self_join(series, window_length) else {
            continue;
        };

        let picked = match settings.selection {
            MotifSelection::Typical => smallest_k(&mp.profile, settings.motif_count),
            MotifSelection::Discord => largest_k(&mp.profile, settings.motif_count),
        };

        debug!(sensor, picked = picked.len(), window_length, "Motif candidates");

        candidates.extend(picked.into_iter().map(|r| Candidate {
            sensor,
            start: r.index,
            motif_distance: r.value,
            window: series[r.index..r.index + window_length].to_vec(),
        }));
    }

    candidates
}

/// Find the two shapelets for the anomaly at `anomaly_index`, viewed through `sensor`.
///
/// `window_length` is the padded prototype length; the padding on each side is
/// `(window_length - anomaly_length) / 2`.
pub fn find_shapelets(
    dataset: &AnomalyDataset,
    anomaly_index: usize,
    window_length: usize,
    sensor: usize,
    settings: &ShapeletSettings,
) -> Result<Shapelets, ExplainError> {
    let record = *dataset.anomaly(anomaly_index)?;
    if window_length < record.length {
        return Err(ExplainError::InvalidConfig(format!(
            "window length {} is shorter than the anomaly ({})",
            window_length, record.length
        )));
    }
    if dataset.len() < window_length {
        return Err(ExplainError::InsufficientHistory {
            required: window_length,
            available: dataset.len(),
        });
    }

    let pad = (window_length - record.length) / 2;
    let anomaly = padded_window(
        dataset.series(sensor),
        record.start_index as isize - pad as isize,
        window_length,
    );

    let candidates = motif_candidates(dataset, window_length, settings);
    let use_cross = settings.ranking == ShapeletRanking::CrossProfile
        && window_length >= settings.cross_subsequence_length;

    let scores: Vec<f64> = candidates
        .iter()
        .map(|c| {
            if use_cross {
                cross_profile_score(&c.window, &anomaly, settings.cross_subsequence_length)
            } else {
                mean_substituted_distance(&c.window, &anomaly, pad, record.length)
            }
        })
        .collect();

    let top = largest_k(&scores, 2);
    let [first, second] = top.as_slice() else {
        return Err(ExplainError::InsufficientHistory {
            required: 2,
            available: top.len(),
        });
    };

    debug!(
        sensor,
        candidates = candidates.len(),
        cross = use_cross,
        first = first.index,
        second = second.index,
        "Shapelets ranked"
    );

    Ok(Shapelets {
        first: ScoredCandidate {
            candidate: candidates[first.index].clone(),
            score: first.value,
        },
        second: ScoredCandidate {
            candidate: candidates[second.index].clone(),
            score: second.value,
        },
        anomaly,
        candidates_considered: candidates.len(),
    })
}

/// Summed finite AB-join distance from `candidate` to `anomaly`
fn cross_profile_score(candidate: &[Option<f64>], anomaly: &[Option<f64>], m: usize) -> f64 {
    ab_join(candidate, anomaly, m)
        .map(|profile| finite_sum(&profile))
        .unwrap_or(f64::NAN)
}

/// Euclidean distance to the anomaly window whose `[pad, pad + length)` core is
/// replaced by the window's own mean. Positions missing on either side are skipped.
pub(crate) fn mean_substituted_distance(
    candidate: &[Option<f64>],
    anomaly: &[Option<f64>],
    pad: usize,
    length: usize,
) -> f64 {
    let Some(fill) = stats::mean_present(anomaly) else {
        return f64::NAN;
    };
    let core = pad..pad + length;

    candidate
        .iter()
        .zip(anomaly)
        .enumerate()
        .filter_map(|(i, (c, a))| {
            let reference = if core.contains(&i) { Some(fill) } else { *a };
            Some((c.as_ref()? - reference?).powi(2))
        })
        .sum::<f64>()
        .sqrt()
}
