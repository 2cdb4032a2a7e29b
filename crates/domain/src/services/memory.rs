//! In-memory store implementations for development and testing.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::errors::StoreError;
use crate::models::{Gift, GiftStatus, GiftSummary, Owner, Recipients};
use crate::services::store::{GiftStore, OwnerDirectory};

#[derive(Debug, Default)]
struct GiftTable {
    gifts: BTreeMap<i64, Gift>,
    next_id: i64,
    /// Number of `mark_released` calls per gift id.
    flips: HashMap<i64, usize>,
}

/// Gift store backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct InMemoryGiftStore {
    table: Mutex<GiftTable>,
    unavailable: AtomicBool,
}

impl InMemoryGiftStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> Result<MutexGuard<'_, GiftTable>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store unavailable".to_string()));
        }
        self.table
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }

    /// Make every subsequent call fail with a backend error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Insert a gift with a chosen id, replacing any existing one.
    pub fn insert(&self, gift: Gift) {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.next_id = table.next_id.max(gift.id);
        table.gifts.insert(gift.id, gift);
    }

    /// How many times `mark_released` was called for the gift.
    pub fn release_flips(&self, gift_id: i64) -> usize {
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.flips.get(&gift_id).copied().unwrap_or(0)
    }

    /// Snapshot of a gift, ignoring availability.
    pub fn snapshot(&self, gift_id: i64) -> Option<Gift> {
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.gifts.get(&gift_id).cloned()
    }
}

#[async_trait::async_trait]
impl GiftStore for InMemoryGiftStore {
    async fn create_gift(
        &self,
        owner_id: i64,
        file_name: &str,
        file_data: &[u8],
        custom_message: &str,
    ) -> Result<Gift, StoreError> {
        let mut table = self.table()?;
        table.next_id += 1;
        let gift = Gift {
            id: table.next_id,
            owner_id,
            file_name: file_name.to_string(),
            file_data: file_data.to_vec(),
            custom_message: custom_message.to_string(),
            recipients: Recipients::default(),
            pending: true,
            scheduled_release: None,
            created_at: Utc::now(),
        };
        table.gifts.insert(gift.id, gift.clone());
        Ok(gift)
    }

    async fn get_gift(&self, gift_id: i64) -> Result<Gift, StoreError> {
        self.table()?
            .gifts
            .get(&gift_id)
            .cloned()
            .ok_or_else(|| StoreError::gift_not_found(gift_id))
    }

    async fn get_status(&self, gift_id: i64) -> Result<GiftStatus, StoreError> {
        self.table()?
            .gifts
            .get(&gift_id)
            .map(Gift::status)
            .ok_or_else(|| StoreError::gift_not_found(gift_id))
    }

    async fn set_recipients_and_schedule(
        &self,
        gift_id: i64,
        recipients: &Recipients,
        custom_message: Option<&str>,
        scheduled_release: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut table = self.table()?;
        let gift = table
            .gifts
            .get_mut(&gift_id)
            .ok_or_else(|| StoreError::gift_not_found(gift_id))?;
        gift.recipients = recipients.clone();
        if let Some(message) = custom_message {
            gift.custom_message = message.to_string();
        }
        gift.scheduled_release = scheduled_release;
        Ok(())
    }

    async fn mark_released(&self, gift_id: i64) -> Result<bool, StoreError> {
        let mut table = self.table()?;
        *table.flips.entry(gift_id).or_insert(0) += 1;
        match table.gifts.get_mut(&gift_id) {
            Some(gift) => {
                gift.pending = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn is_pending(&self, gift_id: i64) -> Result<bool, StoreError> {
        Ok(self
            .table()?
            .gifts
            .get(&gift_id)
            .map(|g| g.pending)
            .unwrap_or(false))
    }

    async fn has_any_pending_for_owner(&self, owner_id: i64) -> Result<bool, StoreError> {
        Ok(self
            .table()?
            .gifts
            .values()
            .any(|g| g.owner_id == owner_id && g.pending))
    }

    async fn pending_gift_ids_for_owner(&self, owner_id: i64) -> Result<Vec<i64>, StoreError> {
        Ok(self
            .table()?
            .gifts
            .values()
            .filter(|g| g.owner_id == owner_id && g.pending)
            .map(|g| g.id)
            .collect())
    }

    async fn list_gifts_for_owner(&self, owner_id: i64) -> Result<Vec<GiftSummary>, StoreError> {
        let mut gifts: Vec<GiftSummary> = self
            .table()?
            .gifts
            .values()
            .filter(|g| g.owner_id == owner_id)
            .map(Gift::summary)
            .collect();
        gifts.sort_by_key(|g| (g.scheduled_release.is_none(), g.scheduled_release, g.id));
        Ok(gifts)
    }

    async fn list_armed_gifts(&self) -> Result<Vec<GiftStatus>, StoreError> {
        Ok(self
            .table()?
            .gifts
            .values()
            .filter(|g| g.pending && !g.recipients.is_empty())
            .map(Gift::status)
            .collect())
    }

    async fn delete_gift(&self, gift_id: i64) -> Result<bool, StoreError> {
        Ok(self.table()?.gifts.remove(&gift_id).is_some())
    }
}

/// Owner directory backed by a map.
#[derive(Debug, Default)]
pub struct InMemoryOwnerDirectory {
    owners: Mutex<HashMap<i64, Owner>>,
}

impl InMemoryOwnerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, owner: Owner) {
        let mut owners = self.owners.lock().unwrap_or_else(|e| e.into_inner());
        owners.insert(owner.id, owner);
    }

    fn owners(&self) -> Result<MutexGuard<'_, HashMap<i64, Owner>>, StoreError> {
        self.owners
            .lock()
            .map_err(|_| StoreError::Backend("directory lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl OwnerDirectory for InMemoryOwnerDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Owner, StoreError> {
        self.owners()?
            .values()
            .find(|o| o.username == username)
            .cloned()
            .ok_or_else(|| StoreError::owner_not_found(username))
    }

    async fn primary_contact(&self, owner_id: i64) -> Result<String, StoreError> {
        self.owners()?
            .get(&owner_id)
            .map(|o| o.primary_contact_email.clone())
            .ok_or_else(|| StoreError::owner_not_found(owner_id))
    }
}
