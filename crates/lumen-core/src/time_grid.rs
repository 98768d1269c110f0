//! Time-Grid Resolver
//!
//! Derives the sampling frequency of a detector dataset and turns hour-based
//! paddings into sample counts. Window extraction never fails: positions that
//! fall outside the series become missing-value markers.

use crate::dataset::AnomalyDataset;
use crate::error::ExplainError;
use chrono::{Datelike, NaiveDateTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};

pub const HOURS_PER_WEEK: usize = 168;
pub const MINUTES_PER_DAY: u32 = 1440;
pub const MINUTES_PER_WEEK: u32 = 7 * MINUTES_PER_DAY;
const SECONDS_PER_HOUR: i64 = 3600;

/// One sensor's values over a time selection; `None` marks a missing value
pub type Window = Vec<Option<f64>>;

/// Sampling grid of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeGrid {
    pub frequency_per_hour: usize,
    pub samples_per_week: usize,
    pub step_seconds: i64,
}

impl TimeGrid {
    /// Resolve the grid from the first two timestamps of the dataset
    pub fn resolve(dataset: &AnomalyDataset) -> Result<Self, ExplainError> {
        Self::from_timestamps(dataset.timestamps())
    }

    pub fn from_timestamps(timestamps: &[NaiveDateTime]) -> Result<Self, ExplainError> {
        let step_seconds = match timestamps {
            [first, second, ..] => (*second - *first).num_seconds(),
            _ => return Err(ExplainError::UnsupportedResolution { step_seconds: 0 }),
        };

        if step_seconds <= 0 || SECONDS_PER_HOUR % step_seconds != 0 {
            return Err(ExplainError::UnsupportedResolution { step_seconds });
        }

        let frequency_per_hour = (SECONDS_PER_HOUR / step_seconds) as usize;
        Ok(Self {
            frequency_per_hour,
            samples_per_week: HOURS_PER_WEEK * frequency_per_hour,
            step_seconds,
        })
    }

    pub fn step(&self) -> TimeDelta {
        TimeDelta::seconds(self.step_seconds)
    }

    pub fn padding_samples(&self, padding_hours: usize) -> usize {
        padding_hours * self.frequency_per_hour
    }

    /// `2 * padding + anomaly_length`, the length shared by every prototype
    pub fn window_length(&self, padding_hours: usize, anomaly_length: usize) -> usize {
        2 * self.padding_samples(padding_hours) + anomaly_length
    }
}

/// Minutes since Monday 00:00 of the timestamp's week
pub fn week_minute(ts: &NaiveDateTime) -> u32 {
    ts.weekday().num_days_from_monday() * MINUTES_PER_DAY + ts.hour() * 60 + ts.minute()
}

/// Read `[low, low + window_length)` from `series`, padding out-of-range positions with `None`
pub fn padded_window(series: &[Option<f64>], low: isize, window_length: usize) -> Window {
    let n = series.len() as isize;
    let prefix = (-low).clamp(0, window_length as isize) as usize;
    let read_start = low.clamp(0, n);
    let read_end = (low + window_length as isize).clamp(read_start, n);

    let mut window = Vec::with_capacity(window_length);
    window.extend(std::iter::repeat_n(None, prefix));
    window.extend_from_slice(&series[read_start as usize..read_end as usize]);
    window.resize(window_length, None);
    window
}
