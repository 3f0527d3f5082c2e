//! Unified error handling for duetd.

use thiserror::Error;

/// Errors that can occur while handling an inbound user event.
///
/// User input mistakes and state conflicts are answered with corrective
/// prompts inside the dispatcher and never surface here; these variants
/// cover the genuinely exceptional paths.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("empty user id")]
    EmptyUserId,

    #[error("delivery failed: {0}")]
    Delivery(#[from] crate::messenger::DeliveryError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyUserId => "empty_user_id",
            Self::Delivery(_) => "delivery_failed",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Result type for event handlers.
pub type HandlerResult = Result<(), HandlerError>;
