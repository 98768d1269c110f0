//! # lumen-core - Post-hoc Explanations for Building-Sensor Anomalies
//!
//! Given the output of an upstream anomaly detector (timestamps, raw sensor
//! values, per-sensor and aggregate reconstruction errors, anomalous ranges),
//! explains one anomaly in two ways:
//!
//! - **Attribution** - percentage contribution of every sensor.
//! - **Prototypes** - two comparison windows shown beside the anomaly window,
//!   built from past weeks, mean/median baselines, or matrix-profile motifs.
//!
//! ## Architecture
//!
//! ```text
//!   DetectorPayload ──► AnomalyDataset ──► select_sensor (attribution)
//!                                               │
//!                                               ▼
//!                                         TimeGrid::resolve
//!                                               │
//!            ┌───────────────┬─────────────────┼──────────────────┐
//!            ▼               ▼                 ▼                  ▼
//!       local_weeks     fixed_stride     weekday_mask       find_shapelets
//!                                                       (matrix profile + top-k)
//!            └───────────────┴─────────────────┴──────────────────┘
//!                                               │
//!                                               ▼
//!                                          Prototypes
//! ```
//!
//! The core is synchronous and stateless per request. The only I/O is the
//! optional remote detector used as an attribution provider.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lumen_core::{ExplainConfig, boundary};
//!
//! let body = std::fs::read_to_string("payload.json").unwrap();
//! let response = boundary::handle_prototypes(&body, 1, &ExplainConfig::default());
//! println!("{}", serde_json::to_string(&response).unwrap());
//! ```

// Data model and validation
pub mod dataset;
pub mod error;

// Core components
pub mod attribution;
pub mod baseline;
pub mod matrix_profile;
pub mod prototypes;
pub mod ranking;
pub mod shapelets;
pub mod stats;
pub mod time_grid;

// Ambient
pub mod config;
pub mod metrics;

// Outer surfaces
pub mod boundary;
pub mod detector_client;

pub use attribution::{
    AttributionProvider, AttributionStrategy, ErrorRatioAttributor, SensorShare, attribute,
    responsible_sensor, select_sensor,
};
pub use baseline::{BaselineWindows, LocalWindows, fixed_stride, local_weeks, weekday_mask};
pub use config::ExplainConfig;
pub use dataset::{AnomalyDataset, AnomalyRecord, ColumnPayload, DetectorPayload};
pub use detector_client::{DetectorClient, DetectorClientConfig, DetectorScores, RemoteAttributor};
pub use error::ExplainError;
pub use matrix_profile::{MatrixProfile, ab_join, self_join};
pub use prototypes::{PrototypeStrategy, Prototypes, create_prototypes};
pub use ranking::{Ranked, largest_k, smallest_k};
pub use shapelets::{MotifSelection, ShapeletRanking, ShapeletSettings, Shapelets, find_shapelets};
pub use time_grid::{TimeGrid, Window, padded_window};
