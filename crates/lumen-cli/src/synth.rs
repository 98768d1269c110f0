//! Synthetic Building-Sensor Generator
//!
//! Produces detector payloads with realistic daily and weekly seasonality,
//! Gaussian noise and one injected anomaly in the final week. Per-sensor
//! "deep-error" is the absolute deviation from the noise-free signal scaled by
//! the sensor's daily amplitude, so the injected sensor dominates the
//! attribution inside the anomalous range.

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use lumen_core::{AnomalyRecord, ColumnPayload, DetectorPayload, ExplainError};
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const SENSOR_KINDS: [(&str, f64, f64, f64); 5] = [
    // name, base, daily amplitude, weekend drop
    ("power", 120.0, 40.0, 35.0),
    ("temperature", 21.0, 1.5, 1.0),
    ("co2", 600.0, 250.0, 200.0),
    ("humidity", 45.0, 5.0, 2.0),
    ("occupancy", 80.0, 70.0, 75.0),
];

/// Minimum deep-error so the aggregate error is never zero
const ERROR_FLOOR: f64 = 1e-3;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SynthConfig {
    pub weeks: usize,
    pub sensors: usize,
    pub step_minutes: i64,
    pub seed: u64,
    /// Anomaly length in samples
    pub anomaly_length: usize,
    /// Anomaly offset as a multiple of the sensor's daily amplitude
    pub anomaly_magnitude: f64,
    /// Noise standard deviation as a fraction of the daily amplitude
    pub noise_ratio: f64,
    pub building: String,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            weeks: 4,
            sensors: 3,
            step_minutes: 15,
            seed: 42,
            anomaly_length: 4,
            anomaly_magnitude: 2.0,
            noise_ratio: 0.05,
            building: "synthetic-building".to_string(),
        }
    }
}

impl SynthConfig {
    pub fn validate(&self) -> Result<(), ExplainError> {
        if self.weeks < 2 {
            return Err(ExplainError::InvalidConfig("weeks must be at least 2".into()));
        }
        if self.sensors == 0 {
            return Err(ExplainError::InvalidConfig("sensors must be positive".into()));
        }
        if self.step_minutes <= 0 || 60 % self.step_minutes != 0 {
            return Err(ExplainError::InvalidConfig(format!(
                "step of {} minutes does not divide one hour",
                self.step_minutes
            )));
        }
        if self.anomaly_length == 0 || self.anomaly_length >= self.samples_per_week() / 2 {
            return Err(ExplainError::InvalidConfig(
                "anomaly_length must fit inside half a week".into(),
            ));
        }
        if !(self.noise_ratio >= 0.0 && self.noise_ratio.is_finite()) {
            return Err(ExplainError::InvalidConfig("noise_ratio must be non-negative".into()));
        }
        Ok(())
    }

    pub fn samples_per_week(&self) -> usize {
        (7 * 24 * 60 / self.step_minutes) as usize
    }
}

struct SensorModel {
    name: String,
    base: f64,
    daily_amplitude: f64,
    weekend_drop: f64,
}

impl SensorModel {
    fn for_index(i: usize) -> Self {
        let (kind, base, daily_amplitude, weekend_drop) = SENSOR_KINDS[i % SENSOR_KINDS.len()];
        let name = match i / SENSOR_KINDS.len() {
            0 => kind.to_string(),
            n => format!("{}_{}", kind, n + 1),
        };
        Self {
            name,
            base,
            daily_amplitude,
            weekend_drop,
        }
    }

    /// Noise-free value: office-hours bump peaking mid-afternoon, lower at weekends
    fn expected(&self, ts: &NaiveDateTime) -> f64 {
        let hour = ts.hour() as f64 + ts.minute() as f64 / 60.0;
        let daily = ((hour - 9.0) * std::f64::consts::TAU / 24.0).sin();
        let weekend = if ts.weekday().num_days_from_monday() >= 5 {
            self.weekend_drop
        } else {
            0.0
        };
        self.base + self.daily_amplitude * daily - weekend
    }
}

/// Ground truth of a generated dataset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InjectedAnomaly {
    pub sensor: usize,
    pub record: AnomalyRecord,
}

pub struct BuildingGenerator {
    config: SynthConfig,
    rng: StdRng,
    models: Vec<SensorModel>,
}

impl BuildingGenerator {
    pub fn new(config: SynthConfig) -> Result<Self, ExplainError> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        let models = (0..config.sensors).map(SensorModel::for_index).collect();
        Ok(Self { config, rng, models })
    }

    /// Generate one payload and the anomaly that was injected into it
    pub fn generate(&mut self) -> Result<(DetectorPayload, InjectedAnomaly), ExplainError> {
        let spw = self.config.samples_per_week();
        let n = self.config.weeks * spw;
        let len = self.config.anomaly_length;

        // Monday 2024-01-01 00:00
        let origin = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| ExplainError::InvalidConfig("invalid origin".into()))?;
        let step = TimeDelta::minutes(self.config.step_minutes);
        let timestamps: Vec<NaiveDateTime> =
            (0..n).map(|i| origin + step * i as i32).collect();

        let margin = spw / 14;
        let start = self.rng.random_range(n - spw + margin..n - len - margin);
        let record = AnomalyRecord::new(start, len);
        let anomalous_sensor = self.rng.random_range(0..self.models.len());

        let mut dataframe = BTreeMap::new();
        let mut deep_error = Vec::with_capacity(self.models.len());
        for (s, model) in self.models.iter().enumerate() {
            let noise = Normal::new(0.0, model.daily_amplitude * self.config.noise_ratio)
                .map_err(|e| ExplainError::InvalidConfig(e.to_string()))?;

            let mut values = Vec::with_capacity(n);
            let mut errors = Vec::with_capacity(n);
            for (i, ts) in timestamps.iter().enumerate() {
                let expected = model.expected(ts);
                let mut value = expected + noise.sample(&mut self.rng);
                if s == anomalous_sensor && record.range().contains(&i) {
                    value += self.config.anomaly_magnitude * model.daily_amplitude;
                }
                errors.push((value - expected).abs() / model.daily_amplitude + ERROR_FLOOR);
                values.push(Some(value));
            }

            dataframe.insert(model.name.clone(), ColumnPayload::Sequence(values));
            deep_error.push(errors);
        }
        let error: Vec<f64> = (0..n).map(|i| deep_error.iter().map(|row| row[i]).sum()).collect();

        debug!(
            samples = n,
            sensors = self.models.len(),
            anomaly_start = start,
            anomalous_sensor,
            "Generated building dataset"
        );

        let payload = DetectorPayload {
            sensors: self.models.iter().map(|m| m.name.clone()).collect(),
            timestamps: timestamps
                .iter()
                .map(|ts| ts.format("%Y-%m-%dT%H:%M:%S").to_string())
                .collect(),
            deep_error,
            error,
            dataframe,
            anomalies: vec![record],
            algo: Some(2),
            building: Some(self.config.building.clone()),
            config: None,
        };

        Ok((
            payload,
            InjectedAnomaly {
                sensor: anomalous_sensor,
                record,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::{AnomalyDataset, AttributionStrategy, attribute, responsible_sensor};

    fn small() -> SynthConfig {
        SynthConfig {
            weeks: 3,
            sensors: 3,
            step_minutes: 60,
            seed: 7,
            ..Default::default()
        }
    }

    #[test]
    fn test_same_seed_same_payload() {
        let (a, ga) = BuildingGenerator::new(small()).unwrap().generate().unwrap();
        let (b, gb) = BuildingGenerator::new(small()).unwrap().generate().unwrap();
        assert_eq!(ga, gb);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_payload_shape_and_anomaly_placement() {
        let config = small();
        let (payload, truth) = BuildingGenerator::new(config.clone()).unwrap().generate().unwrap();
        let n = 3 * 168;
        assert_eq!(payload.timestamps.len(), n);
        assert_eq!(payload.sensors, vec!["power", "temperature", "co2"]);
        assert_eq!(payload.deep_error.len(), 3);
        assert!(truth.record.start_index >= n - 168);
        assert!(truth.record.end() <= n);

        let ds = AnomalyDataset::from_payload(payload).unwrap();
        assert_eq!(ds.len(), n);
        assert_eq!(ds.algo(), Some(2));
    }

    #[test]
    fn test_injected_sensor_dominates_attribution() {
        for seed in [1, 2, 3] {
            let config = SynthConfig { seed, ..small() };
            let (payload, truth) = BuildingGenerator::new(config).unwrap().generate().unwrap();
            let ds = AnomalyDataset::from_payload(payload).unwrap();
            let attribution = attribute(&ds, 0, AttributionStrategy::Averaged).unwrap();
            assert_eq!(responsible_sensor(&attribution), truth.sensor, "seed {}", seed);
        }
    }

    #[test]
    fn test_sensor_names_repeat_with_suffix() {
        assert_eq!(SensorModel::for_index(5).name, "power_2");
        assert_eq!(SensorModel::for_index(9).name, "occupancy_2");
    }

    #[test]
    fn test_invalid_configs() {
        assert!(BuildingGenerator::new(SynthConfig { weeks: 1, ..small() }).is_err());
        assert!(BuildingGenerator::new(SynthConfig { step_minutes: 7, ..small() }).is_err());
        assert!(BuildingGenerator::new(SynthConfig { sensors: 0, ..small() }).is_err());
    }
}
