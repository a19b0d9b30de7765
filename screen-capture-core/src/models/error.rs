use thiserror::Error;

use super::state::SessionState;

/// Errors that can cross the capture core boundary.
///
/// Only configuration-level failures are reported here. Per-buffer anomalies
/// (incomplete frames, unsupported audio formats) are absorbed by the session
/// and show up in `DeliveryDiagnostics` instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("screen recording permission denied")]
    PermissionDenied,

    #[error("capture target is no longer available")]
    TargetUnavailable,

    #[error("configuration rejected: {0}")]
    ConfigurationRejected(String),

    #[error("cannot {operation} while {from}")]
    InvalidTransition {
        from: SessionState,
        operation: &'static str,
    },

    #[error("capture service already has an active stream")]
    StreamAlreadyActive,

    #[error("stream failed: {0}")]
    StreamFailed(String),

    #[error("timed out waiting for the capture service")]
    Timeout,

    #[error("capture service unavailable")]
    ServiceUnavailable,

    #[error("picker is not active")]
    PickerInactive,

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}
