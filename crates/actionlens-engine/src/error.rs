use thiserror::Error;

/// Shown when a failure carries no usable detail of its own.
pub const GENERIC_FAILURE_MESSAGE: &str = "Could not analyze image. Please try another.";

/// Why a prediction attempt produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictError {
    /// The service could not be reached at all.
    #[error("cannot reach the prediction server at {endpoint}: {reason}")]
    Connectivity { endpoint: String, reason: String },
    /// The service answered with a non-success status.
    #[error("{detail}")]
    Service { status: u16, detail: String },
    /// The service answered 2xx but flagged the prediction as failed.
    #[error("Prediction failed")]
    PredictionFailed,
    /// The body did not match the prediction contract.
    #[error("malformed prediction response: {0}")]
    MalformedResponse(String),
}

impl PredictError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connectivity { .. } => "connectivity",
            Self::Service { .. } => "service",
            Self::PredictionFailed => "prediction_failed",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }

    /// Message the front end shows in its error slot.
    pub fn user_message(&self) -> String {
        match self {
            Self::Connectivity { endpoint, .. } => format!(
                "Cannot connect to the prediction server. Please ensure the backend is running on {endpoint}"
            ),
            Self::Service { detail, .. } if !detail.trim().is_empty() => detail.clone(),
            Self::PredictionFailed => "Prediction failed".to_string(),
            Self::Service { .. } | Self::MalformedResponse(_) => {
                GENERIC_FAILURE_MESSAGE.to_string()
            }
        }
    }
}
