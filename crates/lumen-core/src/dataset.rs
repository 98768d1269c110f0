//! Detector Output Data Model
//!
//! `DetectorPayload` mirrors the JSON the upstream anomaly detector emits.
//! `AnomalyDataset` is the validated, time-aligned form the core works on:
//! one timestamp axis, and every per-sensor series stored as a plain vector
//! aligned to it.

use crate::error::ExplainError;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

const TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// A contiguous anomalous range `[start_index, start_index + length)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    #[serde(alias = "index")]
    pub start_index: usize,
    #[serde(default = "default_length")]
    pub length: usize,
}

fn default_length() -> usize {
    1
}

impl AnomalyRecord {
    pub fn new(start_index: usize, length: usize) -> Self {
        Self {
            start_index,
            length,
        }
    }

    /// Exclusive end index
    pub fn end(&self) -> usize {
        self.start_index + self.length
    }

    pub fn midpoint(&self) -> usize {
        self.start_index + self.length / 2
    }

    pub fn range(&self) -> Range<usize> {
        self.start_index..self.end()
    }
}

/// One raw sensor column, either keyed by timestamp or positional
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnPayload {
    Indexed(BTreeMap<String, Option<f64>>),
    Sequence(Vec<Option<f64>>),
}

/// Raw output of the anomaly detection service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorPayload {
    #[serde(default)]
    pub sensors: Vec<String>,
    #[serde(default)]
    pub timestamps: Vec<String>,
    #[serde(rename = "deep-error", default)]
    pub deep_error: Vec<Vec<f64>>,
    #[serde(default)]
    pub error: Vec<f64>,
    #[serde(default)]
    pub dataframe: BTreeMap<String, ColumnPayload>,
    #[serde(default)]
    pub anomalies: Vec<AnomalyRecord>,
    /// Detector type; `2` is the reconstruction-error detector with per-sensor errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algo: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

impl DetectorPayload {
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty() || self.timestamps.is_empty()
    }
}

/// Parse a detector timestamp into wall-clock time
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, ExplainError> {
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(ts);
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_local())
        .map_err(|_| ExplainError::malformed(format!("unparseable timestamp '{}'", raw)))
}

/// Validated detector output for a single explanation request
#[derive(Debug, Clone)]
pub struct AnomalyDataset {
    sensors: Vec<String>,
    timestamps: Vec<NaiveDateTime>,
    values: Vec<Vec<Option<f64>>>,
    deep_error: Vec<Vec<f64>>,
    error: Vec<f64>,
    anomalies: Vec<AnomalyRecord>,
    algo: Option<u32>,
    building: Option<String>,
    detector_config: Option<serde_json::Value>,
}

impl AnomalyDataset {
    /// Build a dataset from already-aligned columns.
    ///
    /// `values` holds one series per sensor. `deep_error` may be empty for
    /// detectors that do not report per-sensor errors.
    pub fn new(
        sensors: Vec<String>,
        timestamps: Vec<NaiveDateTime>,
        values: Vec<Vec<Option<f64>>>,
        deep_error: Vec<Vec<f64>>,
        error: Vec<f64>,
        anomalies: Vec<AnomalyRecord>,
    ) -> Result<Self, ExplainError> {
        let dataset = Self {
            sensors,
            timestamps,
            values,
            deep_error,
            error,
            anomalies,
            algo: None,
            building: None,
            detector_config: None,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn with_algo(mut self, algo: u32) -> Self {
        self.algo = Some(algo);
        self
    }

    pub fn with_detector_context(
        mut self,
        building: Option<String>,
        config: Option<serde_json::Value>,
    ) -> Self {
        self.building = building;
        self.detector_config = config;
        self
    }

    /// Convert the raw detector payload, aligning every dataframe column to `timestamps`
    pub fn from_payload(payload: DetectorPayload) -> Result<Self, ExplainError> {
        if payload.is_empty() {
            return Err(ExplainError::EmptyPayload);
        }

        let timestamps = payload
            .timestamps
            .iter()
            .map(|raw| parse_timestamp(raw))
            .collect::<Result<Vec<_>, _>>()?;

        let mut values = Vec::with_capacity(payload.sensors.len());
        for sensor in &payload.sensors {
            let column = payload.dataframe.get(sensor).ok_or_else(|| {
                ExplainError::malformed(format!("no dataframe column for sensor '{}'", sensor))
            })?;
            values.push(align_column(sensor, column, &timestamps)?);
        }

        let dataset = Self::new(
            payload.sensors,
            timestamps,
            values,
            payload.deep_error,
            payload.error,
            payload.anomalies,
        )?;

        Ok(Self {
            algo: payload.algo,
            building: payload.building,
            detector_config: payload.config,
            ..dataset
        })
    }

    fn validate(&self) -> Result<(), ExplainError> {
        if self.sensors.is_empty() || self.timestamps.is_empty() {
            return Err(ExplainError::EmptyPayload);
        }
        let n = self.timestamps.len();

        if let Some(pos) = self.timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(ExplainError::malformed(format!(
                "timestamps must be strictly increasing (position {})",
                pos + 1
            )));
        }

        if self.values.len() != self.sensors.len() {
            return Err(ExplainError::malformed(format!(
                "{} value columns for {} sensors",
                self.values.len(),
                self.sensors.len()
            )));
        }
        if let Some((i, col)) = self.values.iter().enumerate().find(|(_, c)| c.len() != n) {
            return Err(ExplainError::malformed(format!(
                "sensor '{}' has {} values, expected {}",
                self.sensors[i],
                col.len(),
                n
            )));
        }

        if !self.deep_error.is_empty() {
            if self.deep_error.len() != self.sensors.len() {
                return Err(ExplainError::malformed(format!(
                    "deep-error has {} rows for {} sensors",
                    self.deep_error.len(),
                    self.sensors.len()
                )));
            }
            if self.deep_error.iter().any(|row| row.len() != n) {
                return Err(ExplainError::malformed("deep-error rows must match timestamps"));
            }
            if self.error.len() != n {
                return Err(ExplainError::malformed(format!(
                    "error has {} entries, expected {}",
                    self.error.len(),
                    n
                )));
            }
        } else if !self.error.is_empty() && self.error.len() != n {
            return Err(ExplainError::malformed("error must match timestamps"));
        }

        for (i, record) in self.anomalies.iter().enumerate() {
            if record.length == 0 || record.end() > n {
                return Err(ExplainError::malformed(format!(
                    "anomaly {} ({}+{}) is outside {} samples",
                    i, record.start_index, record.length, n
                )));
            }
        }

        Ok(())
    }

    pub fn sensors(&self) -> &[String] {
        &self.sensors
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    pub fn sensor_name(&self, sensor: usize) -> &str {
        &self.sensors[sensor]
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// Number of samples per series
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Raw values of one sensor, aligned to `timestamps`
    pub fn series(&self, sensor: usize) -> &[Option<f64>] {
        &self.values[sensor]
    }

    pub fn deep_error(&self) -> &[Vec<f64>] {
        &self.deep_error
    }

    pub fn has_deep_error(&self) -> bool {
        !self.deep_error.is_empty()
    }

    pub fn error(&self) -> &[f64] {
        &self.error
    }

    pub fn anomalies(&self) -> &[AnomalyRecord] {
        &self.anomalies
    }

    /// Look up an anomaly by its 0-based position
    pub fn anomaly(&self, index: usize) -> Result<&AnomalyRecord, ExplainError> {
        self.anomalies
            .get(index)
            .ok_or(ExplainError::InvalidAnomalyIndex {
                index,
                available: self.anomalies.len(),
            })
    }

    pub fn algo(&self) -> Option<u32> {
        self.algo
    }

    pub fn building(&self) -> Option<&str> {
        self.building.as_deref()
    }

    pub fn detector_config(&self) -> Option<&serde_json::Value> {
        self.detector_config.as_ref()
    }
}

fn align_column(
    sensor: &str,
    column: &ColumnPayload,
    timestamps: &[NaiveDateTime],
) -> Result<Vec<Option<f64>>, ExplainError> {
    match column {
        ColumnPayload::Sequence(values) => {
            if values.len() != timestamps.len() {
                return Err(ExplainError::malformed(format!(
                    "sensor '{}' has {} values, expected {}",
                    sensor,
                    values.len(),
                    timestamps.len()
                )));
            }
            Ok(values.clone())
        }
        ColumnPayload::Indexed(by_time) => {
            let mut lookup = HashMap::with_capacity(by_time.len());
            for (raw, value) in by_time {
                lookup.insert(parse_timestamp(raw)?, *value);
            }
            Ok(timestamps
                .iter()
                .map(|ts| lookup.get(ts).copied().flatten())
                .collect())
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};

    /// Uniform grid starting Monday 2024-01-01 00:00
    pub fn grid(n: usize, step_minutes: i64) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        (0..n)
            .map(|i| start + TimeDelta::minutes(step_minutes * i as i64))
            .collect()
    }

    pub fn single_sensor(
        values: Vec<f64>,
        step_minutes: i64,
        anomaly: AnomalyRecord,
    ) -> AnomalyDataset {
        let n = values.len();
        AnomalyDataset::new(
            vec!["s0".to_string()],
            grid(n, step_minutes),
            vec![values.into_iter().map(Some).collect()],
            Vec::new(),
            Vec::new(),
            vec![anomaly],
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> DetectorPayload {
        serde_json::from_value(json!({
            "deep-error": [[1.0, 2.0, 3.0], [3.0, 6.0, 9.0]],
            "dataframe": {
                "water": {
                    "2020-07-31T20:00:00": 1.4,
                    "2020-07-31T20:15:00": 1.4,
                    "2020-07-31T20:30:00": 1.3
                },
                "power": [1.5, null, 1.7]
            },
            "sensors": ["water", "power"],
            "algo": 2,
            "timestamps": ["2020-07-31T20:00:00", "2020-07-31T20:15:00", "2020-07-31T20:30:00"],
            "anomalies": [{"index": 1, "length": 2}],
            "error": [4.0, 8.0, 12.0]
        }))
        .unwrap()
    }

    #[test]
    fn test_from_payload_aligns_columns() {
        let ds = AnomalyDataset::from_payload(payload()).unwrap();
        assert_eq!(ds.sensor_count(), 2);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.series(0), &[Some(1.4), Some(1.4), Some(1.3)]);
        assert_eq!(ds.series(1), &[Some(1.5), None, Some(1.7)]);
        assert_eq!(ds.algo(), Some(2));
        assert_eq!(ds.anomaly(0).unwrap().range(), 1..3);
    }

    #[test]
    fn test_indexed_column_missing_stamp_is_missing_value() {
        let mut p = payload();
        if let Some(ColumnPayload::Indexed(map)) = p.dataframe.get_mut("water") {
            map.remove("2020-07-31T20:15:00");
        }
        let ds = AnomalyDataset::from_payload(p).unwrap();
        assert_eq!(ds.series(0)[1], None);
    }

    #[test]
    fn test_empty_payload() {
        let err = AnomalyDataset::from_payload(DetectorPayload::default()).unwrap_err();
        assert_eq!(err, ExplainError::EmptyPayload);
    }

    #[test]
    fn test_unknown_sensor_column() {
        let mut p = payload();
        p.sensors[1] = "electricity".to_string();
        let err = AnomalyDataset::from_payload(p).unwrap_err();
        assert!(matches!(err, ExplainError::MalformedPayload(_)));
    }

    #[test]
    fn test_anomaly_out_of_bounds_rejected() {
        let mut p = payload();
        p.anomalies = vec![AnomalyRecord::new(2, 5)];
        assert!(matches!(
            AnomalyDataset::from_payload(p),
            Err(ExplainError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_non_increasing_timestamps_rejected() {
        let mut p = payload();
        p.timestamps.swap(0, 1);
        p.dataframe.insert("water".into(), ColumnPayload::Sequence(vec![Some(1.0); 3]));
        assert!(matches!(
            AnomalyDataset::from_payload(p),
            Err(ExplainError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_invalid_anomaly_index() {
        let ds = AnomalyDataset::from_payload(payload()).unwrap();
        assert_eq!(
            ds.anomaly(5).unwrap_err(),
            ExplainError::InvalidAnomalyIndex {
                index: 5,
                available: 1
            }
        );
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(parse_timestamp("2021-12-21T09:45:00").is_ok());
        assert!(parse_timestamp("2021-12-21 09:45:00").is_ok());
        assert!(parse_timestamp("2021-12-21T09:45:00.000").is_ok());
        assert!(parse_timestamp("2021-12-21T09:45:00+01:00").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }
}
