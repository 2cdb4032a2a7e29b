//! Liveness oracle: is there still something to release?

use std::sync::Arc;

use crate::errors::StoreError;
use crate::services::store::GiftStore;

/// Point-in-time pending checks. Nothing is cached.
#[derive(Clone)]
pub struct LivenessOracle {
    store: Arc<dyn GiftStore>,
}

impl LivenessOracle {
    pub fn new(store: Arc<dyn GiftStore>) -> Self {
        Self { store }
    }

    /// True iff the gift exists and is still pending.
    pub async fn is_pending(&self, gift_id: i64) -> Result<bool, StoreError> {
        self.store.is_pending(gift_id).await
    }

    /// True iff the owner has at least one pending gift.
    pub async fn has_any_pending(&self, owner_id: i64) -> Result<bool, StoreError> {
        self.store.has_any_pending_for_owner(owner_id).await
    }
}
