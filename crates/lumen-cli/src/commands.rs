//! Command implementations behind the `lumen` binary.
//!
//! Every command returns a `CommandOutput`: an HTTP-like status and a JSON
//! body. The binary prints successful bodies on stdout and failures on stderr.

use crate::synth::{BuildingGenerator, SynthConfig};
use lumen_core::attribution::{AttributionProvider, AttributionStrategy, ErrorRatioAttributor};
use lumen_core::boundary::{self, ApiResponse, status_for};
use lumen_core::{
    DetectorClient, DetectorClientConfig, ExplainConfig, ExplainError, PrototypeStrategy,
    RemoteAttributor,
};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub status: u16,
    pub body: serde_json::Value,
}

impl CommandOutput {
    fn ok(body: serde_json::Value) -> Self {
        Self { status: 200, body }
    }

    fn from_error(err: &ExplainError) -> Self {
        let (status, detail) = status_for(err);
        Self {
            status,
            body: json!({ "detail": detail }),
        }
    }

    fn from_response<T: Serialize>(response: ApiResponse<T>) -> Self {
        let body = match (&response.data, &response.detail) {
            (Some(data), _) => serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
            (None, detail) => json!({ "detail": detail }),
        };
        Self {
            status: response.status,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 0 on success, 2 for caller errors, 1 for everything else
    pub fn exit_code(&self) -> u8 {
        match self.status {
            200..=299 => 0,
            400..=499 => 2,
            _ => 1,
        }
    }
}

/// Build the explanation config from an optional file plus CLI overrides
pub fn load_config(
    path: Option<&Path>,
    strategy: Option<PrototypeStrategy>,
    padding_hours: Option<usize>,
) -> Result<ExplainConfig, ExplainError> {
    let mut config = match path {
        Some(p) => ExplainConfig::from_json_file(p)?,
        None => ExplainConfig::default(),
    };
    if let Some(strategy) = strategy {
        config.strategy = strategy;
    }
    if let Some(hours) = padding_hours {
        config.padding_hours = hours;
    }
    config.validate()?;
    Ok(config)
}

/// A missing or unreadable input file is the caller's fault
fn read_input(input: &Path) -> Result<String, ExplainError> {
    std::fs::read_to_string(input)
        .map_err(|e| {
            ExplainError::MalformedPayload(format!("cannot read {}: {}", input.display(), e))
        })
}

pub fn prototypes(input: &Path, anomaly: i64, config: &ExplainConfig) -> CommandOutput {
    match read_input(input) {
        Ok(body) => {
            CommandOutput::from_response(boundary::handle_prototypes(&body, anomaly, config))
        }
        Err(e) => CommandOutput::from_error(&e),
    }
}

pub async fn attribution(
    input: &Path,
    anomaly: i64,
    method: AttributionStrategy,
    remote: Option<&str>,
    config: &ExplainConfig,
) -> CommandOutput {
    let body = match read_input(input) {
        Ok(body) => body,
        Err(e) => return CommandOutput::from_error(&e),
    };

    let provider: Box<dyn AttributionProvider> = match remote {
        Some(url) => {
            let client_config = DetectorClientConfig {
                base_url: url.to_string(),
                ..config.detector.clone()
            };
            match DetectorClient::new(client_config) {
                Ok(client) => Box::new(RemoteAttributor::new(
                    client,
                    config.padding_hours,
                    config.attribution_driven_algo,
                )),
                Err(e) => return CommandOutput::from_error(&e),
            }
        }
        None => Box::new(ErrorRatioAttributor::new(method)),
    };

    info!(provider = provider.name(), anomaly, "Computing attribution");
    CommandOutput::from_response(
        boundary::handle_attribution(&body, anomaly, provider.as_ref()).await,
    )
}

/// Generate a synthetic payload, writing it to `output` or returning it as the body
pub fn generate(config: SynthConfig, output: Option<&Path>) -> CommandOutput {
    let generated = BuildingGenerator::new(config).and_then(|mut g| g.generate());
    let (payload, truth) = match generated {
        Ok(pair) => pair,
        Err(e) => return CommandOutput::from_error(&e),
    };

    let Some(path) = output else {
        return CommandOutput::ok(serde_json::to_value(&payload).unwrap_or(serde_json::Value::Null));
    };

    let written = serde_json::to_string(&payload)
        .map_err(|e| e.to_string())
        .and_then(|text| std::fs::write(path, text).map_err(|e| e.to_string()));
    match written {
        Ok(()) => {
            info!(path = %path.display(), samples = payload.timestamps.len(), "Wrote payload");
            CommandOutput::ok(json!({
                "output": path.display().to_string(),
                "samples": payload.timestamps.len(),
                "sensors": payload.sensors,
                // 1-based, as the prototypes and attribution commands expect
                "anomaly": 1,
                "anomalous_sensor": payload.sensors[truth.sensor],
                "anomaly_start_index": truth.record.start_index,
                "anomaly_length": truth.record.length,
            }))
        }
        Err(e) => CommandOutput {
            status: 500,
            body: json!({ "detail": e }),
        },
    }
}

pub fn routes() -> CommandOutput {
    let routes: Vec<serde_json::Value> = boundary::get_api_routes()
        .into_iter()
        .map(|(method, path, description)| {
            json!({ "method": method, "path": path, "description": description })
        })
        .collect();
    CommandOutput::ok(json!({ "routes": routes }))
}
