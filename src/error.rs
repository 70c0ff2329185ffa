use std::time::Duration;

use crate::models::job::Phase;
use crate::services::analysis::ServiceError;

/// Errors surfaced to the presentation layer by the analysis client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid image: {0}")]
    InvalidInput(String),

    #[error("Please select at least one filter")]
    NoFilterSelected,

    #[error("No ingredients detected. Please try uploading a different image")]
    NoIngredients,

    #[error("Upload failed: {0}")]
    UploadFailed(#[source] ServiceError),

    #[error("Failed to start analysis: {0}")]
    AnalysisRequestFailed(#[source] ServiceError),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Analysis did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Service returned no result for filter '{0}'")]
    MissingResult(String),

    #[error("Unknown filter '{0}'")]
    UnknownFilter(String),

    #[error("Cannot {action} while job is {phase}")]
    InvalidTransition { phase: Phase, action: &'static str },

    #[error("Job was reset or replaced before the response arrived")]
    Superseded,
}

impl ClientError {
    /// Input problems the user can correct without resetting the job.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidInput(_)
                | ClientError::NoFilterSelected
                | ClientError::NoIngredients
                | ClientError::InvalidTransition { .. }
        )
    }

    /// The client and service disagree about the protocol (version mismatch),
    /// as opposed to transient unavailability.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ClientError::MissingResult(_) | ClientError::UnknownFilter(_)
        )
    }
}
