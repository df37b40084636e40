use std::time::Duration;

use thiserror::Error;
use tonic::Status;
use tonic_types::StatusExt;
use tracing::{error, info};

/// Errors surfaced by the client pipeline.
///
/// The pipeline never converts a failure into a fallback value: every variant
/// propagates to the immediate caller unchanged. End-of-stream is not an
/// error and never appears here.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The remote returned a gRPC status, or the transport failed mid-call.
    #[error("gRPC error: {0}")]
    Status(#[from] Status),

    /// Failed to establish the underlying connection.
    #[error("transport error")]
    Transport(#[from] tonic::transport::Error),

    /// A deadline interceptor expired before the downstream call completed.
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// Rejected locally by an open circuit; the transport was never invoked.
    #[error("circuit '{circuit}' is open")]
    CircuitOpen { circuit: String },

    /// The outbound half of a stream was gone before all messages were sent.
    #[error("outbound stream closed before send completed")]
    SendClosed,

    /// A duplex call ended without its completion signal firing.
    #[error("duplex call ended without completing")]
    Incomplete,
}

impl ClientError {
    /// gRPC status code equivalent, for outcome classification.
    pub fn code(&self) -> tonic::Code {
        match self {
            ClientError::Status(status) => status.code(),
            ClientError::DeadlineExceeded(_) => tonic::Code::DeadlineExceeded,
            ClientError::CircuitOpen { .. } => tonic::Code::Unavailable,
            ClientError::Transport(_) | ClientError::SendClosed | ClientError::Incomplete => {
                tonic::Code::Unavailable
            }
        }
    }
}

/// Log the structured detail payloads a failed status may carry.
///
/// Inspection only: the status propagates to the caller regardless of what is
/// found here.
pub fn log_status_details(status: &Status) {
    error!(code = %status.code(), message = %status.message(), "call failed");

    if let Some(failure) = status.get_details_precondition_failure() {
        for violation in &failure.violations {
            error!(violation = ?violation, "precondition violated");
        }
    }

    if let Some(error_info) = status.get_details_error_info() {
        error!(
            reason = %error_info.reason,
            domain = %error_info.domain,
            "error info"
        );
        for (key, value) in &error_info.metadata {
            info!(key = %key, value = %value, "error info metadata");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_mapping() {
        let err = ClientError::DeadlineExceeded(Duration::from_secs(1));
        assert_eq!(err.code(), tonic::Code::DeadlineExceeded);

        let err = ClientError::CircuitOpen {
            circuit: "resiliency".to_string(),
        };
        assert_eq!(err.code(), tonic::Code::Unavailable);

        let err = ClientError::from(Status::not_found("missing"));
        assert_eq!(err.code(), tonic::Code::NotFound);
    }

    #[test]
    fn test_status_details_are_inspect_only() {
        // A status without details must pass through the logger untouched.
        let status = Status::failed_precondition("no details attached");
        log_status_details(&status);
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);
    }
}
