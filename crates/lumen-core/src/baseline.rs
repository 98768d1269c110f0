//! Baseline Window Aggregation
//!
//! Builds "expected behavior" windows for one sensor by collecting every
//! historical occurrence of the anomaly's time-of-week and reducing them
//! position by position.
//!
//! Strategies:
//! - Fixed stride: one window every `samples_per_week` samples, aligned to the
//!   padded anomaly start. Block starts must satisfy `i < N - window_length`,
//!   so a block that would end exactly at the last sample is skipped, and the
//!   anomaly's own block is included when it qualifies.
//! - Weekday mask: every sample whose week-minute falls inside the padded
//!   anomaly interval, split into consecutive frames of `window_length`.
//! - Local weeks: the same window one and two weeks away from the anomaly.

use crate::dataset::{AnomalyDataset, AnomalyRecord};
use crate::error::ExplainError;
use crate::stats;
use crate::time_grid::{TimeGrid, Window, padded_window, week_minute};
use chrono::TimeDelta;
use tracing::debug;

/// Mean and median baselines plus the anomaly's own window
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineWindows {
    pub mean: Window,
    pub median: Window,
    pub anomaly: Window,
    /// Number of historical windows that were reduced
    pub frames: usize,
}

/// Windows one and two weeks away from the anomaly
#[derive(Debug, Clone, PartialEq)]
pub struct LocalWindows {
    pub two_weeks: Window,
    pub one_week: Window,
    pub anomaly: Window,
    /// `false` when there was not enough history and later weeks were used
    pub looking_back: bool,
}

/// Fixed-stride weekly aggregation
pub fn fixed_stride(
    dataset: &AnomalyDataset,
    sensor: usize,
    record: &AnomalyRecord,
    grid: &TimeGrid,
    padding_hours: usize,
) -> Result<BaselineWindows, ExplainError> {
    let pad = grid.padding_samples(padding_hours);
    let window_length = 2 * pad + record.length;
    let low = record.start_index as isize - pad as isize;
    let first = low.rem_euclid(grid.samples_per_week as isize) as usize;

    let series = dataset.series(sensor);
    let n = series.len();
    let frames: Vec<&[Option<f64>]> = if n > window_length {
        (first..n - window_length)
            .step_by(grid.samples_per_week)
            .map(|i| &series[i..i + window_length])
            .collect()
    } else {
        Vec::new()
    };

    if frames.is_empty() {
        return Err(ExplainError::InsufficientHistory {
            required: first + window_length + 1,
            available: n,
        });
    }

    debug!(
        sensor,
        first_block = first,
        frames = frames.len(),
        window_length,
        "Fixed-stride baseline"
    );

    let (mean, median) = reduce_frames(&frames, window_length);
    Ok(BaselineWindows {
        mean,
        median,
        anomaly: padded_window(series, low, window_length),
        frames: frames.len(),
    })
}

/// Weekday and time-of-day mask aggregation
pub fn weekday_mask(
    dataset: &AnomalyDataset,
    sensor: usize,
    record: &AnomalyRecord,
    grid: &TimeGrid,
    padding_hours: usize,
    exclude_anomaly_occurrence: bool,
) -> Result<BaselineWindows, ExplainError> {
    let pad = grid.padding_samples(padding_hours);
    let window_length = 2 * pad + record.length;
    let timestamps = dataset.timestamps();

    let anchor = timestamps[record.start_index];
    let span = grid.step() * (record.length as i32 - 1);
    let padding = TimeDelta::hours(padding_hours as i64);
    let start_key = week_minute(&(anchor - padding));
    let end_key = week_minute(&(anchor + span + padding));
    let wraps = start_key > end_key;

    let selected: Vec<usize> = timestamps
        .iter()
        .enumerate()
        .filter(|(_, ts)| {
            let key = week_minute(ts);
            if wraps {
                key >= start_key || key <= end_key
            } else {
                key >= start_key && key <= end_key
            }
        })
        .map(|(i, _)| i)
        .collect();

    if selected.is_empty() {
        return Err(ExplainError::InsufficientHistory {
            required: window_length,
            available: 0,
        });
    }
    if selected.len() % window_length != 0 {
        return Err(ExplainError::MisalignedMask {
            selected: selected.len(),
            window_length,
        });
    }

    let own_start = record.start_index as isize - pad as isize;
    let series = dataset.series(sensor);
    let frames: Vec<Window> = selected
        .chunks(window_length)
        .filter(|chunk| !exclude_anomaly_occurrence || chunk[0] as isize != own_start)
        .map(|chunk| chunk.iter().map(|&i| series[i]).collect())
        .collect();

    if frames.is_empty() {
        return Err(ExplainError::InsufficientHistory {
            required: 2 * window_length,
            available: selected.len(),
        });
    }

    debug!(
        sensor,
        start_key,
        end_key,
        wraps,
        frames = frames.len(),
        "Weekday-mask baseline"
    );

    let frame_refs: Vec<&[Option<f64>]> = frames.iter().map(|f| f.as_slice()).collect();
    let (mean, median) = reduce_frames(&frame_refs, window_length);
    Ok(BaselineWindows {
        mean,
        median,
        anomaly: padded_window(series, own_start, window_length),
        frames: frames.len(),
    })
}

/// The padded anomaly window shifted by one and two weeks
pub fn local_weeks(
    dataset: &AnomalyDataset,
    sensor: usize,
    record: &AnomalyRecord,
    grid: &TimeGrid,
    padding_hours: usize,
) -> Result<LocalWindows, ExplainError> {
    let pad = grid.padding_samples(padding_hours);
    let window_length = 2 * pad + record.length;
    let low = record.start_index as isize - pad as isize;
    let week = grid.samples_per_week as isize;
    let series = dataset.series(sensor);

    let looking_back = record.start_index > 2 * grid.samples_per_week;
    let direction = if looking_back { -1 } else { 1 };

    let two_weeks = padded_window(series, low + direction * 2 * week, window_length);
    let one_week = padded_window(series, low + direction * week, window_length);

    if two_weeks.iter().all(Option::is_none) && one_week.iter().all(Option::is_none) {
        return Err(ExplainError::InsufficientHistory {
            required: record.start_index + grid.samples_per_week + 1,
            available: series.len(),
        });
    }

    Ok(LocalWindows {
        two_weeks,
        one_week,
        anomaly: padded_window(series, low, window_length),
        looking_back,
    })
}

/// Reduce each row position across frames to its mean and median
fn reduce_frames(frames: &[&[Option<f64>]], window_length: usize) -> (Window, Window) {
    let mut mean = Vec::with_capacity(window_length);
    let mut median = Vec::with_capacity(window_length);
    let mut column = Vec::with_capacity(frames.len());

    for pos in 0..window_length {
        column.clear();
        column.extend(frames.iter().map(|frame| frame[pos]));
        mean.push(stats::mean_present(&column));
        median.push(stats::median_present(&column));
    }

    (mean, median)
}
