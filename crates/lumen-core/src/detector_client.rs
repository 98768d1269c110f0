//! Remote Detector Client
//!
//! Re-scores a data window through the upstream anomaly-detection service and
//! turns the returned per-sensor errors into an attribution vector.
//! Requests have a bounded timeout and a bounded number of retries with
//! exponential backoff; every failure after the last attempt surfaces as
//! `UpstreamUnavailable`.

use crate::attribution::{AttributionProvider, renormalize};
use crate::dataset::AnomalyDataset;
use crate::error::ExplainError;
use crate::stats;
use crate::time_grid::{TimeGrid, padded_window};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, warn};

pub const DEFAULT_DETECTOR_URL: &str = "http://anomaly-detection";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for DetectorClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_DETECTOR_URL.to_string(),
            timeout_ms: 5000,
            max_retries: 1,
            retry_base_delay_ms: 100,
        }
    }
}

/// Aggregate and per-sensor reconstruction errors for a re-scored window
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetectorScores {
    #[serde(default)]
    pub error: Vec<f64>,
    #[serde(rename = "deep-error", default)]
    pub deep_error: Vec<Vec<f64>>,
}

/// Where and how a window is scored
#[derive(Debug, Clone, Copy)]
pub struct ScoreRequest<'a> {
    pub algo: u32,
    pub building: Option<&'a str>,
    pub detector_config: Option<&'a serde_json::Value>,
}

pub struct DetectorClient {
    client: reqwest::Client,
    config: DetectorClientConfig,
}

impl DetectorClient {
    pub fn new(config: DetectorClientConfig) -> Result<Self, ExplainError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ExplainError::InvalidConfig(format!("detector client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// POST `{sensor: [values]}` to `/calculate` and decode the scores
    pub async fn score(
        &self,
        request: ScoreRequest<'_>,
        window: &BTreeMap<String, Vec<Option<f64>>>,
    ) -> Result<DetectorScores, ExplainError> {
        let mut query = vec![("algo", request.algo.to_string())];
        if let Some(building) = request.building {
            query.push(("building", building.to_string()));
        }
        if let Some(config) = request.detector_config {
            query.push(("config", config.to_string()));
        }
        let endpoint = format!("{}/calculate", self.config.base_url.trim_end_matches('/'));
        let url = reqwest::Url::parse_with_params(&endpoint, &query)
            .map_err(|e| ExplainError::InvalidConfig(format!("detector url: {}", e)))?;

        let mut last_error = String::new();
        for attempt in 0..=self.config.max_retries {
            match self.client.post(url.clone()).json(window).send().await {
                Ok(response) if response.status().is_success() => {
                    match response.json::<DetectorScores>().await {
                        Ok(scores) => {
                            debug!(
                                attempt,
                                rows = scores.deep_error.len(),
                                "Detector scored window"
                            );
                            return Ok(scores);
                        }
                        Err(e) => {
                            warn!(attempt, error = %e, "Undecodable detector response");
                            last_error = format!("undecodable response: {}", e);
                        }
                    }
                }
                Ok(response) => {
                    warn!(attempt, status = %response.status(), "Detector returned error");
                    last_error = format!("status {}", response.status());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Failed to reach detector");
                    last_error = e.to_string();
                }
            }

            if attempt < self.config.max_retries {
                let delay = self.config.retry_base_delay_ms.saturating_mul(1 << attempt);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        error!(url = %url, error = %last_error, "Detector unavailable after retries");
        Err(ExplainError::UpstreamUnavailable(last_error))
    }
}

/// Attribution from a fresh detector pass over the padded anomaly window
pub struct RemoteAttributor {
    client: DetectorClient,
    padding_hours: usize,
    default_algo: u32,
}

impl RemoteAttributor {
    pub fn new(client: DetectorClient, padding_hours: usize, default_algo: u32) -> Self {
        Self {
            client,
            padding_hours,
            default_algo,
        }
    }
}

#[async_trait]
impl AttributionProvider for RemoteAttributor {
    fn name(&self) -> &str {
        "remote-detector"
    }

    async fn attribute(
        &self,
        dataset: &AnomalyDataset,
        anomaly_index: usize,
    ) -> Result<Vec<f64>, ExplainError> {
        let record = *dataset.anomaly(anomaly_index)?;
        let grid = TimeGrid::resolve(dataset)?;
        let pad = grid.padding_samples(self.padding_hours);
        let window_length = grid.window_length(self.padding_hours, record.length);
        let low = record.start_index as isize - pad as isize;

        let window: BTreeMap<String, Vec<Option<f64>>> = dataset
            .sensors()
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), padded_window(dataset.series(i), low, window_length)))
            .collect();

        let request = ScoreRequest {
            algo: dataset.algo().unwrap_or(self.default_algo),
            building: dataset.building(),
            detector_config: dataset.detector_config(),
        };
        let scores = self.client.score(request, &window).await?;

        // rows come back in the order of the request body keys
        if scores.deep_error.len() != dataset.sensor_count() {
            return Err(ExplainError::UpstreamUnavailable(format!(
                "detector returned {} deep-error rows for {} sensors",
                scores.deep_error.len(),
                dataset.sensor_count()
            )));
        }
        let by_name: BTreeMap<&String, &Vec<f64>> =
            window.keys().zip(scores.deep_error.iter()).collect();

        let reduced: Vec<f64> = dataset
            .sensors()
            .iter()
            .map(|name| by_name.get(name).map_or(f64::NAN, |row| stats::mean(row)))
            .collect();

        renormalize(&reduced).ok_or(ExplainError::DivisionByZero {
            time_index: record.start_index,
        })
    }
}
