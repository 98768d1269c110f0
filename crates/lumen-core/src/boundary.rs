//! Transport-independent request handlers
//!
//! Converts raw request bodies and 1-based anomaly indices into core calls and
//! maps every outcome to a status code plus either data or a generic detail.
//! Internal error messages never reach the caller; they are logged instead.

use crate::attribution::{AttributionProvider, SensorShare, shares};
use crate::config::ExplainConfig;
use crate::dataset::{AnomalyDataset, DetectorPayload};
use crate::error::ExplainError;
use crate::metrics::EXPLAIN_FAILURES;
use crate::prototypes::{PrototypeStrategy, create_prototypes};
use crate::time_grid::Window;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

pub const EMPTY_PAYLOAD_DETAIL: &str = "Payload can not be empty";
pub const MALFORMED_PAYLOAD_DETAIL: &str = "Payload is malformed";
pub const INTERNAL_ERROR_DETAIL: &str = "Internal Server Error";

/// Outcome of one handler call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: 200,
            success: true,
            data: Some(data),
            detail: None,
        }
    }

    pub fn failure(err: &ExplainError) -> Self {
        let (status, detail) = status_for(err);
        Self {
            status,
            success: false,
            data: None,
            detail: Some(detail.to_string()),
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrototypeResponse {
    pub prototype_a: Window,
    pub prototype_b: Window,
    pub anomaly: Window,
    pub sensor: String,
    pub strategy: PrototypeStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResponse {
    pub attribution: Vec<SensorShare>,
}

/// Status code and caller-facing detail for an error
pub fn status_for(err: &ExplainError) -> (u16, &'static str) {
    match err {
        ExplainError::EmptyPayload => (400, EMPTY_PAYLOAD_DETAIL),
        ExplainError::MalformedPayload(_) => (400, MALFORMED_PAYLOAD_DETAIL),
        _ => (500, INTERNAL_ERROR_DETAIL),
    }
}

/// Parse a request body into a dataset.
///
/// Accepts the detector payload directly or wrapped as `{"payload": {...}}`.
/// A blank body or a `null` payload is `EmptyPayload`.
pub fn parse_request_body(raw: &str) -> Result<AnomalyDataset, ExplainError> {
    if raw.trim().is_empty() {
        return Err(ExplainError::EmptyPayload);
    }

    let mut value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| ExplainError::malformed(e.to_string()))?;
    if let Some(inner) = value.get_mut("payload").map(serde_json::Value::take) {
        value = inner;
    }
    if value.is_null() || value.as_object().is_some_and(|o| o.is_empty()) {
        return Err(ExplainError::EmptyPayload);
    }

    let payload: DetectorPayload =
        serde_json::from_value(value).map_err(|e| ExplainError::malformed(e.to_string()))?;
    AnomalyDataset::from_payload(payload)
}

/// Convert a 1-based anomaly index from the caller into a 0-based one
pub fn to_zero_based(one_based: i64, available: usize) -> Result<usize, ExplainError> {
    if one_based < 1 {
        return Err(ExplainError::InvalidAnomalyIndex {
            index: one_based.max(0) as usize,
            available,
        });
    }
    Ok((one_based - 1) as usize)
}

fn reject<T>(operation: &str, err: &ExplainError) -> ApiResponse<T> {
    EXPLAIN_FAILURES.with_label_values(&[err.kind()]).inc();
    error!(operation, kind = err.kind(), error = %err, "Request rejected");
    ApiResponse::failure(err)
}

/// Handle POST /prototypes
pub fn handle_prototypes(
    body: &str,
    anomaly_index: i64,
    config: &ExplainConfig,
) -> ApiResponse<PrototypeResponse> {
    let dataset = match parse_request_body(body) {
        Ok(ds) => ds,
        Err(e) => return reject("prototypes", &e),
    };
    let index = match to_zero_based(anomaly_index, dataset.anomalies().len()) {
        Ok(i) => i,
        Err(e) => return reject("prototypes", &e),
    };

    // failures are counted by the assembler itself
    match create_prototypes(Some(&dataset), index, config) {
        Ok(p) => ApiResponse::success(PrototypeResponse {
            prototype_a: p.prototype_a,
            prototype_b: p.prototype_b,
            anomaly: p.anomaly,
            sensor: p.sensor_name,
            strategy: p.strategy,
        }),
        Err(e) => {
            error!(operation = "prototypes", kind = e.kind(), error = %e, "Request failed");
            ApiResponse::failure(&e)
        }
    }
}

/// Handle POST /attribution
pub async fn handle_attribution(
    body: &str,
    anomaly_index: i64,
    provider: &dyn AttributionProvider,
) -> ApiResponse<AttributionResponse> {
    let dataset = match parse_request_body(body) {
        Ok(ds) => ds,
        Err(e) => return reject("attribution", &e),
    };
    let index = match to_zero_based(anomaly_index, dataset.anomalies().len()) {
        Ok(i) => i,
        Err(e) => return reject("attribution", &e),
    };

    match provider.attribute(&dataset, index).await {
        Ok(attribution) => {
            info!(provider = provider.name(), anomaly = index, "Attribution computed");
            ApiResponse::success(AttributionResponse {
                attribution: shares(&dataset, &attribution),
            })
        }
        Err(e) => reject("attribution", &e),
    }
}

/// Operations exposed by the boundary
pub fn get_api_routes() -> Vec<(&'static str, &'static str, &'static str)> {
    vec![
        (
            "POST",
            "/prototypes",
            "Prototype windows for the anomaly at a 1-based index",
        ),
        (
            "POST",
            "/attribution",
            "Per-sensor percentage contributions for an anomaly",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::{AttributionStrategy, ErrorRatioAttributor};
    use serde_json::json;

    fn body() -> String {
        json!({
            "sensors": ["s0", "s1"],
            "timestamps": [
                "2024-01-01T00:00:00", "2024-01-01T00:15:00",
                "2024-01-01T00:30:00", "2024-01-01T00:45:00"
            ],
            "deep-error": [[1, 2, 3, 4], [3, 6, 9, 12]],
            "error": [4, 8, 12, 16],
            "dataframe": {"s0": [1.0, 2.0, 3.0, 4.0], "s1": [5.0, 6.0, 7.0, 8.0]},
            "anomalies": [{"start_index": 1, "length": 1}],
            "algo": 2
        })
        .to_string()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&ExplainError::EmptyPayload), (400, EMPTY_PAYLOAD_DETAIL));
        assert_eq!(status_for(&ExplainError::malformed("x")).0, 400);
        let internal = ExplainError::InsufficientHistory {
            required: 10,
            available: 2,
        };
        assert_eq!(status_for(&internal), (500, INTERNAL_ERROR_DETAIL));
    }

    #[test]
    fn test_empty_bodies() {
        for raw in ["", "   ", "null", "{}", r#"{"payload": null}"#] {
            let err = parse_request_body(raw).unwrap_err();
            assert_eq!(err, ExplainError::EmptyPayload, "{:?}", raw);
        }
        let response = handle_prototypes("", 1, &ExplainConfig::default());
        assert_eq!(response.status, 400);
        assert_eq!(response.detail.as_deref(), Some(EMPTY_PAYLOAD_DETAIL));
        assert!(response.is_client_error());
    }

    #[test]
    fn test_wrapped_payload() {
        let wrapped = format!(r#"{{"payload": {}}}"#, body());
        let ds = parse_request_body(&wrapped).unwrap();
        assert_eq!(ds.sensor_count(), 2);
        assert!(matches!(parse_request_body("{not json"), Err(ExplainError::MalformedPayload(_))));
    }

    #[test]
    fn test_zero_based_conversion() {
        assert_eq!(to_zero_based(1, 3).unwrap(), 0);
        assert_eq!(to_zero_based(3, 3).unwrap(), 2);
        assert!(matches!(to_zero_based(0, 3), Err(ExplainError::InvalidAnomalyIndex { .. })));
        assert!(to_zero_based(-4, 3).is_err());
    }

    #[test]
    fn test_prototypes_internal_error_is_generic() {
        // four samples cannot hold any weekly history
        let response = handle_prototypes(&body(), 1, &ExplainConfig::default());
        assert_eq!(response.status, 500);
        assert_eq!(response.detail.as_deref(), Some(INTERNAL_ERROR_DETAIL));
        assert!(response.data.is_none());

        let response = handle_prototypes(&body(), 2, &ExplainConfig::default());
        assert_eq!(response.status, 500);
    }

    #[tokio::test]
    async fn test_attribution_handler() {
        let provider = ErrorRatioAttributor::new(AttributionStrategy::Point);
        let response = handle_attribution(&body(), 1, &provider).await;
        assert_eq!(response.status, 200);
        let data = response.data.unwrap();
        assert_eq!(data.attribution[0].name, "s0");
        assert_eq!(data.attribution[0].percent, 25.0);
        assert_eq!(data.attribution[1].percent, 75.0);

        let serialized = serde_json::to_value(ApiResponse::<AttributionResponse>::failure(
            &ExplainError::EmptyPayload,
        ))
        .unwrap();
        assert_eq!(serialized["detail"], "Payload can not be empty");
        assert!(serialized.get("data").is_none());
    }
}
