//! Prototype Assembler
//!
//! Orchestrates one explanation request: validate the anomaly index, pick the
//! responsible sensor, resolve the time grid and dispatch to the configured
//! prototype strategy.

use crate::attribution::select_sensor;
use crate::baseline;
use crate::config::ExplainConfig;
use crate::dataset::AnomalyDataset;
use crate::error::ExplainError;
use crate::metrics::{COMPUTE_LATENCY, EXPLAIN_FAILURES, EXPLAIN_REQUESTS};
use crate::shapelets::{ShapeletSettings, find_shapelets};
use crate::time_grid::{TimeGrid, Window};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Family of comparison windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrototypeStrategy {
    /// Same window two weeks and one week away
    Local,
    /// Mean and median over fixed weekly blocks
    FixedStride,
    /// Mean and median over every same-time-of-week occurrence
    #[default]
    WeekdayMask,
    /// Two matrix-profile motifs ranked against the anomaly
    Shapelets,
}

impl PrototypeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::FixedStride => "fixed_stride",
            Self::WeekdayMask => "weekday_mask",
            Self::Shapelets => "shapelets",
        }
    }
}

impl std::str::FromStr for PrototypeStrategy {
    type Err = ExplainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "fixed_stride" | "fixed-stride" => Ok(Self::FixedStride),
            "weekday_mask" | "weekday-mask" => Ok(Self::WeekdayMask),
            "shapelets" => Ok(Self::Shapelets),
            other => Err(ExplainError::InvalidConfig(format!(
                "unknown prototype strategy '{}'",
                other
            ))),
        }
    }
}

/// Two comparison windows and the anomaly window, all for the same sensor
#[derive(Debug, Clone, PartialEq)]
pub struct Prototypes {
    pub prototype_a: Window,
    pub prototype_b: Window,
    pub anomaly: Window,
    pub sensor: usize,
    pub sensor_name: String,
    pub strategy: PrototypeStrategy,
}

/// Build the prototypes for the anomaly at `anomaly_index` (0-based)
pub fn create_prototypes(
    dataset: Option<&AnomalyDataset>,
    anomaly_index: usize,
    config: &ExplainConfig,
) -> Result<Prototypes, ExplainError> {
    EXPLAIN_REQUESTS.inc();
    let timer = COMPUTE_LATENCY.start_timer();

    let result = dataset
        .filter(|ds| !ds.is_empty())
        .ok_or(ExplainError::EmptyPayload)
        .and_then(|ds| assemble(ds, anomaly_index, config));

    timer.observe_duration();
    match &result {
        Ok(p) => info!(
            anomaly = anomaly_index,
            sensor = %p.sensor_name,
            strategy = p.strategy.as_str(),
            "Prototypes created"
        ),
        Err(e) => {
            EXPLAIN_FAILURES.with_label_values(&[e.kind()]).inc();
            warn!(anomaly = anomaly_index, kind = e.kind(), error = %e, "Prototype request failed");
        }
    }
    result
}

fn assemble(
    dataset: &AnomalyDataset,
    anomaly_index: usize,
    config: &ExplainConfig,
) -> Result<Prototypes, ExplainError> {
    config.validate()?;
    let record = *dataset.anomaly(anomaly_index)?;
    let sensor = select_sensor(
        dataset,
        anomaly_index,
        config.attribution,
        config.attribution_driven_algo,
    )?;
    let grid = TimeGrid::resolve(dataset)?;
    let padding = config.padding_hours;

    let (prototype_a, prototype_b, anomaly) = match config.strategy {
        PrototypeStrategy::Local => {
            let w = baseline::local_weeks(dataset, sensor, &record, &grid, padding)?;
            (w.two_weeks, w.one_week, w.anomaly)
        }
        PrototypeStrategy::FixedStride => {
            let w = baseline::fixed_stride(dataset, sensor, &record, &grid, padding)?;
            (w.mean, w.median, w.anomaly)
        }
        PrototypeStrategy::WeekdayMask => {
            let w = baseline::weekday_mask(
                dataset,
                sensor,
                &record,
                &grid,
                padding,
                config.exclude_anomaly_occurrence,
            )?;
            (w.mean, w.median, w.anomaly)
        }
        PrototypeStrategy::Shapelets => {
            let window_length = grid.window_length(padding, record.length);
            let settings = ShapeletSettings::from(config);
            let s = find_shapelets(dataset, anomaly_index, window_length, sensor, &settings)?;
            (s.first.candidate.window, s.second.candidate.window, s.anomaly)
        }
    };

    Ok(Prototypes {
        prototype_a,
        prototype_b,
        anomaly,
        sensor,
        sensor_name: dataset.sensor_name(sensor).to_string(),
        strategy: config.strategy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::AnomalyRecord;
    use crate::dataset::test_support::grid;

    const DAY_HOURLY: usize = 24;
    const WEEK_HOURLY: usize = 168;

    /// Three weeks of hourly data for two sensors with a daily cycle
    fn hourly(algo: u32) -> AnomalyDataset {
        let n = 3 * WEEK_HOURLY;
        let daily = |i: usize| ((i % DAY_HOURLY) as f64 * std::f64::consts::TAU / 24.0).sin();
        let a: Vec<Option<f64>> = (0..n).map(|i| Some(10.0 + daily(i))).collect();
        let b: Vec<Option<f64>> = (0..n).map(|i| Some(50.0 + 5.0 * daily(i))).collect();
        let deep_error = vec![vec![1.0; n], vec![3.0; n]];
        AnomalyDataset::new(
            vec!["temp".into(), "power".into()],
            grid(n, 60),
            vec![a, b],
            deep_error,
            vec![4.0; n],
            vec![AnomalyRecord::new(2 * WEEK_HOURLY + 30, 3)],
        )
        .unwrap()
        .with_algo(algo)
    }

    fn config(strategy: PrototypeStrategy) -> ExplainConfig {
        ExplainConfig {
            strategy,
            padding_hours: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_every_strategy_returns_equal_lengths() {
        let ds = hourly(2);
        for strategy in [
            PrototypeStrategy::Local,
            PrototypeStrategy::FixedStride,
            PrototypeStrategy::WeekdayMask,
            PrototypeStrategy::Shapelets,
        ] {
            let p = create_prototypes(Some(&ds), 0, &config(strategy)).unwrap();
            assert_eq!(p.anomaly.len(), 7, "{:?}", strategy);
            assert_eq!(p.prototype_a.len(), 7, "{:?}", strategy);
            assert_eq!(p.prototype_b.len(), 7, "{:?}", strategy);
            assert_eq!(p.strategy, strategy);
        }
    }

    #[test]
    fn test_attribution_driven_sensor() {
        let p = create_prototypes(Some(&hourly(2)), 0, &config(PrototypeStrategy::Local)).unwrap();
        assert_eq!(p.sensor, 1);
        assert_eq!(p.sensor_name, "power");

        let p = create_prototypes(Some(&hourly(1)), 0, &config(PrototypeStrategy::Local)).unwrap();
        assert_eq!(p.sensor, 0);
    }

    #[test]
    fn test_local_prototypes_match_previous_weeks() {
        let ds = hourly(1);
        let p = create_prototypes(Some(&ds), 0, &config(PrototypeStrategy::Local)).unwrap();
        let low = 2 * WEEK_HOURLY + 28;
        assert_eq!(p.anomaly, ds.series(0)[low..low + 7].to_vec());
        let two_back = low - 2 * WEEK_HOURLY;
        let one_back = low - WEEK_HOURLY;
        assert_eq!(p.prototype_a, ds.series(0)[two_back..two_back + 7].to_vec());
        assert_eq!(p.prototype_b, ds.series(0)[one_back..one_back + 7].to_vec());
    }

    #[test]
    fn test_empty_and_invalid_requests() {
        let cfg = ExplainConfig::default();
        assert_eq!(create_prototypes(None, 0, &cfg).unwrap_err(), ExplainError::EmptyPayload);
        assert!(matches!(
            create_prototypes(Some(&hourly(2)), 5, &cfg),
            Err(ExplainError::InvalidAnomalyIndex { index: 5, available: 1 })
        ));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "fixed-stride".parse::<PrototypeStrategy>().unwrap(),
            PrototypeStrategy::FixedStride
        );
        assert_eq!(
            "shapelets".parse::<PrototypeStrategy>().unwrap(),
            PrototypeStrategy::Shapelets
        );
        assert!("monthly".parse::<PrototypeStrategy>().is_err());
        assert_eq!(PrototypeStrategy::default().as_str(), "weekday_mask");
    }
}
