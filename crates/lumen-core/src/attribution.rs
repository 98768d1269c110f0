//! Feature Attribution
//!
//! Splits the detector's aggregate reconstruction error into per-sensor
//! percentages. The point and midpoint variants divide by the aggregate error
//! at one sample and are not renormalized; the averaged and median variants
//! reduce each sensor's error over the anomalous range and renormalize to 100.

use crate::dataset::AnomalyDataset;
use crate::error::ExplainError;
use crate::metrics::SENSOR_FALLBACK_TOTAL;
use crate::stats;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How the time offset inside the anomalous range is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionStrategy {
    /// Earliest anomalous sample
    #[default]
    Point,
    /// `start + length / 2`
    Midpoint,
    /// Mean over the range, renormalized
    Averaged,
    /// Median over the range, renormalized
    Median,
}

impl AttributionStrategy {
    pub fn renormalizes(&self) -> bool {
        matches!(self, Self::Averaged | Self::Median)
    }
}

/// Contribution of a single sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorShare {
    pub name: String,
    pub percent: f64,
}

/// Compute one percentage per sensor for the anomaly at `anomaly_index` (0-based)
pub fn attribute(
    dataset: &AnomalyDataset,
    anomaly_index: usize,
    strategy: AttributionStrategy,
) -> Result<Vec<f64>, ExplainError> {
    let record = *dataset.anomaly(anomaly_index)?;
    if !dataset.has_deep_error() {
        return Err(ExplainError::malformed("dataset carries no per-sensor deep-error"));
    }
    let deep_error = dataset.deep_error();

    if !strategy.renormalizes() {
        let t = match strategy {
            AttributionStrategy::Midpoint => record.midpoint(),
            _ => record.start_index,
        };
        let total = dataset.error()[t];
        if total == 0.0 {
            return Err(ExplainError::DivisionByZero { time_index: t });
        }
        return Ok(deep_error.iter().map(|row| row[t] / total * 100.0).collect());
    }

    let reduced: Vec<f64> = deep_error
        .iter()
        .map(|row| {
            let span = &row[record.range()];
            if strategy == AttributionStrategy::Averaged {
                stats::mean(span)
            } else {
                stats::median(span)
            }
        })
        .collect();
    renormalize(&reduced).ok_or(ExplainError::DivisionByZero {
        time_index: record.start_index,
    })
}

/// Scale `values` so they sum to 100; `None` when the sum is zero
pub(crate) fn renormalize(values: &[f64]) -> Option<Vec<f64>> {
    let total: f64 = values.iter().sum();
    if total == 0.0 || !total.is_finite() {
        return None;
    }
    Some(values.iter().map(|v| v / total * 100.0).collect())
}

/// Index of the largest contribution, ties broken by lowest index
pub fn responsible_sensor(attribution: &[f64]) -> usize {
    let mut best = 0;
    for (i, value) in attribution.iter().enumerate().skip(1) {
        if *value > attribution[best] {
            best = i;
        }
    }
    best
}

/// Pair each percentage with its sensor name, in sensor order
pub fn shares(dataset: &AnomalyDataset, attribution: &[f64]) -> Vec<SensorShare> {
    dataset
        .sensors()
        .iter()
        .zip(attribution)
        .map(|(name, percent)| SensorShare {
            name: name.clone(),
            percent: *percent,
        })
        .collect()
}

/// Pick the sensor whose prototypes are shown.
///
/// Only detectors of type `attribution_algo` report per-sensor errors; every
/// other detector uses sensor 0. An undefined attribution (zero aggregate
/// error) also falls back to sensor 0.
pub fn select_sensor(
    dataset: &AnomalyDataset,
    anomaly_index: usize,
    strategy: AttributionStrategy,
    attribution_algo: u32,
) -> Result<usize, ExplainError> {
    dataset.anomaly(anomaly_index)?;

    if dataset.algo() != Some(attribution_algo) || !dataset.has_deep_error() {
        debug!(algo = ?dataset.algo(), "Detector without attribution, using sensor 0");
        return Ok(0);
    }

    match attribute(dataset, anomaly_index, strategy) {
        Ok(attribution) => Ok(responsible_sensor(&attribution)),
        Err(ExplainError::DivisionByZero { time_index }) => {
            SENSOR_FALLBACK_TOTAL.inc();
            warn!(
                anomaly = anomaly_index,
                time_index, "Attribution undefined, falling back to sensor 0"
            );
            Ok(0)
        }
        Err(e) => Err(e),
    }
}

/// Source of per-sensor attribution percentages
#[async_trait]
pub trait AttributionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn attribute(
        &self,
        dataset: &AnomalyDataset,
        anomaly_index: usize,
    ) -> Result<Vec<f64>, ExplainError>;
}

/// Attribution computed locally from the detector's own error arrays
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorRatioAttributor {
    pub strategy: AttributionStrategy,
}

impl ErrorRatioAttributor {
    pub fn new(strategy: AttributionStrategy) -> Self {
        Self { strategy }
    }
}

#[async_trait]
impl AttributionProvider for ErrorRatioAttributor {
    fn name(&self) -> &str {
        "error-ratio"
    }

    async fn attribute(
        &self,
        dataset: &AnomalyDataset,
        anomaly_index: usize,
    ) -> Result<Vec<f64>, ExplainError> {
        attribute(dataset, anomaly_index, self.strategy)
    }
}
