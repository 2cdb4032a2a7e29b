//! Domain error types.

use thiserror::Error;

/// Errors returned by the gift and owner stores.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn gift_not_found(gift_id: i64) -> Self {
        StoreError::NotFound(format!("gift {}", gift_id))
    }

    pub fn owner_not_found(owner: impl std::fmt::Display) -> Self {
        StoreError::NotFound(format!("owner {}", owner))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Error taxonomy of the gift release subsystem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GiftError {
    /// Referenced gift or owner does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The notifier could not send. The gift stays pending.
    #[error("Delivery failed: {0}")]
    DeliveryFailure(String),

    /// The gift is no longer pending, so it cannot be reconfigured.
    #[error("Precondition lost: {0}")]
    PreconditionLost(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<StoreError> for GiftError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => GiftError::NotFound(what),
            StoreError::Backend(msg) => GiftError::Store(msg),
        }
    }
}

impl From<validator::ValidationError> for GiftError {
    fn from(err: validator::ValidationError) -> Self {
        let message = err
            .message
            .map(|m| m.to_string())
            .unwrap_or_else(|| err.code.to_string());
        GiftError::InvalidInput(message)
    }
}
