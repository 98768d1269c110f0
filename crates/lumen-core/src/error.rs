//! Error taxonomy for explanation requests
//!
//! Every failure the core can produce is a distinct kind. Nothing is retried
//! internally; the boundary decides what the caller sees.

/// Errors that can occur while explaining an anomaly
#[derive(Debug, Clone, PartialEq)]
pub enum ExplainError {
    /// The detector payload is absent or has no sensors/timestamps
    EmptyPayload,
    /// The payload is present but violates a shape or ordering invariant
    MalformedPayload(String),
    /// Requested anomaly does not exist in the dataset
    InvalidAnomalyIndex { index: usize, available: usize },
    /// Sample spacing does not divide one hour evenly
    UnsupportedResolution { step_seconds: i64 },
    /// Mask-selected sample count is not a multiple of the window length
    MisalignedMask { selected: usize, window_length: usize },
    /// Not enough data to build a window of the requested length
    InsufficientHistory { required: usize, available: usize },
    /// Aggregate error at the attribution point is zero
    DivisionByZero { time_index: usize },
    /// The upstream detection service could not be reached or answered badly
    UpstreamUnavailable(String),
    /// Configuration values are out of range
    InvalidConfig(String),
}

impl ExplainError {
    /// Stable label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyPayload => "empty_payload",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::InvalidAnomalyIndex { .. } => "invalid_anomaly_index",
            Self::UnsupportedResolution { .. } => "unsupported_resolution",
            Self::MisalignedMask { .. } => "misaligned_mask",
            Self::InsufficientHistory { .. } => "insufficient_history",
            Self::DivisionByZero { .. } => "division_by_zero",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }

    /// Whether the failure was caused by the caller's input rather than the computation
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptyPayload | Self::MalformedPayload(_))
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }
}

impl std::fmt::Display for ExplainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "Payload can not be empty"),
            Self::MalformedPayload(e) => write!(f, "Malformed payload: {}", e),
            Self::InvalidAnomalyIndex { index, available } => write!(
                f,
                "Invalid anomaly index: {} ({} anomalies available)",
                index, available
            ),
            Self::UnsupportedResolution { step_seconds } => write!(
                f,
                "Unsupported resolution: a step of {}s does not divide one hour",
                step_seconds
            ),
            Self::MisalignedMask {
                selected,
                window_length,
            } => write!(
                f,
                "Misaligned mask: {} selected samples are not a multiple of window length {}",
                selected, window_length
            ),
            Self::InsufficientHistory {
                required,
                available,
            } => write!(
                f,
                "Insufficient history: need {} samples, have {}",
                required, available
            ),
            Self::DivisionByZero { time_index } => {
                write!(f, "Aggregate error is zero at time index {}", time_index)
            }
            Self::UpstreamUnavailable(e) => write!(f, "Upstream detector unavailable: {}", e),
            Self::InvalidConfig(e) => write!(f, "Invalid config: {}", e),
        }
    }
}

impl std::error::Error for ExplainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(ExplainError::EmptyPayload.is_client_error());
        assert!(ExplainError::malformed("x").is_client_error());
        assert!(!ExplainError::DivisionByZero { time_index: 3 }.is_client_error());
        assert!(!ExplainError::UpstreamUnavailable("timeout".into()).is_client_error());
    }

    #[test]
    fn test_display_includes_context() {
        let err = ExplainError::MisalignedMask {
            selected: 10,
            window_length: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains("4"));
        assert_eq!(err.kind(), "misaligned_mask");
    }
}
