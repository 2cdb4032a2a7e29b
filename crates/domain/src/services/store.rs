//! Store capabilities consumed by the release subsystem.
//!
//! These traits are the only way the scheduler reaches durable state. Every
//! instance is handed its own `Arc<dyn GiftStore>` at spawn time.

use chrono::{DateTime, Utc};

use crate::errors::StoreError;
use crate::models::{Gift, GiftStatus, GiftSummary, Owner, Recipients};

/// Durable storage for gift metadata and payloads.
#[async_trait::async_trait]
pub trait GiftStore: Send + Sync {
    /// Insert a freshly uploaded gift: pending, no recipients, no schedule.
    async fn create_gift(
        &self,
        owner_id: i64,
        file_name: &str,
        file_data: &[u8],
        custom_message: &str,
    ) -> Result<Gift, StoreError>;

    /// Full gift including payload. `NotFound` if absent.
    async fn get_gift(&self, gift_id: i64) -> Result<Gift, StoreError>;

    /// Lightweight status read. `NotFound` if absent.
    async fn get_status(&self, gift_id: i64) -> Result<GiftStatus, StoreError>;

    /// Store recipients, optionally replace the message, and set or clear the
    /// scheduled release. `None` schedule means inactivity-governed.
    async fn set_recipients_and_schedule(
        &self,
        gift_id: i64,
        recipients: &Recipients,
        custom_message: Option<&str>,
        scheduled_release: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Flip `pending` to false. Idempotent; returns false when the row is gone.
    async fn mark_released(&self, gift_id: i64) -> Result<bool, StoreError>;

    /// Whether the gift exists and is still pending.
    async fn is_pending(&self, gift_id: i64) -> Result<bool, StoreError>;

    /// Whether the owner has at least one pending gift.
    async fn has_any_pending_for_owner(&self, owner_id: i64) -> Result<bool, StoreError>;

    /// Ids of the owner's pending gifts, oldest first.
    async fn pending_gift_ids_for_owner(&self, owner_id: i64) -> Result<Vec<i64>, StoreError>;

    /// All of the owner's gifts ordered by release time ascending, undated last.
    async fn list_gifts_for_owner(&self, owner_id: i64) -> Result<Vec<GiftSummary>, StoreError>;

    /// Pending gifts that already have recipients configured.
    async fn list_armed_gifts(&self) -> Result<Vec<GiftStatus>, StoreError>;

    /// Delete a gift. Returns false when nothing was deleted.
    async fn delete_gift(&self, gift_id: i64) -> Result<bool, StoreError>;
}

/// Read access to the external user store.
#[async_trait::async_trait]
pub trait OwnerDirectory: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Owner, StoreError>;

    /// Primary contact address of the owner.
    async fn primary_contact(&self, owner_id: i64) -> Result<String, StoreError>;
}
