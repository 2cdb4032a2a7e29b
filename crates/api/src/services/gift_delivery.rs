//! Gift delivery service.
//!
//! Entry points that create gifts, configure their release and hand release
//! instances to the supervisor. Every call returns as soon as durable state is
//! written; the release itself runs detached.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use domain::errors::GiftError;
use domain::models::gift::normalize_message;
use domain::models::{CalendarEvent, Gift, GiftSummary, Owner, Recipients};
use domain::services::{
    CalendarProjector, Clock, GiftStore, OwnerDirectory, ReleasePolicy, ReleaseTarget,
};
use shared::schedule::resolve_deadline;
use shared::validation::{validate_recipients, validate_username};

use crate::jobs::ReleaseSupervisor;
use crate::middleware::metrics::record_gift_uploaded;

/// Acknowledgement returned once a gift's delivery is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAck {
    pub gift_id: i64,
    pub policy: &'static str,
    /// Effective deadline for fixed-schedule gifts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_at: Option<DateTime<Utc>>,
}

/// Acknowledgement returned once an owner-level check is scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InactivityCheckAck {
    pub username: String,
    pub pending_gifts: usize,
}

#[derive(Clone)]
pub struct GiftDeliveryService {
    store: Arc<dyn GiftStore>,
    owners: Arc<dyn OwnerDirectory>,
    clock: Arc<dyn Clock>,
    default_delay: chrono::Duration,
    supervisor: ReleaseSupervisor,
}

impl GiftDeliveryService {
    /// Builds the service from the collaborators the supervisor already holds.
    pub fn new(supervisor: ReleaseSupervisor) -> Self {
        let ctx = supervisor.context();
        let default_delay = chrono::Duration::from_std(ctx.timing.default_delay)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        Self {
            store: ctx.store.clone(),
            owners: ctx.owners.clone(),
            clock: ctx.clock.clone(),
            default_delay,
            supervisor,
        }
    }

    pub fn supervisor(&self) -> &ReleaseSupervisor {
        &self.supervisor
    }

    async fn owner(&self, username: &str) -> Result<Owner, GiftError> {
        validate_username(username)?;
        Ok(self.owners.find_by_username(username.trim()).await?)
    }

    /// Store a freshly uploaded gift. It stays unscheduled until configured.
    pub async fn upload_gift(
        &self,
        username: &str,
        file_name: &str,
        file_data: &[u8],
        custom_message: Option<String>,
    ) -> Result<Gift, GiftError> {
        let file_name = file_name.trim();
        if file_name.is_empty() || file_data.is_empty() {
            return Err(GiftError::InvalidInput("A non-empty file is required".to_string()));
        }

        let owner = self.owner(username).await?;
        let message = normalize_message(custom_message).unwrap_or_default();
        let gift = self
            .store
            .create_gift(owner.id, file_name, file_data, &message)
            .await?;

        record_gift_uploaded(file_data.len());
        info!(
            gift_id = gift.id,
            owner_id = owner.id,
            size_bytes = file_data.len(),
            "Gift uploaded"
        );
        Ok(gift)
    }

    /// Configure recipients, message and schedule, then arm the release.
    ///
    /// A missing schedule means the gift is released on inactivity. A schedule
    /// that cannot be parsed, or that lies in the past, is replaced by
    /// `now + default_delay` and the effective deadline is persisted.
    pub async fn configure_delivery(
        &self,
        gift_id: i64,
        recipients: Recipients,
        custom_message: Option<String>,
        scheduled_time: Option<&str>,
    ) -> Result<DeliveryAck, GiftError> {
        validate_recipients(recipients.as_slice())?;

        let status = self.store.get_status(gift_id).await?;
        if !status.pending {
            return Err(GiftError::PreconditionLost(format!(
                "Gift {} has already been released",
                gift_id
            )));
        }

        let release_at = match scheduled_time.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => {
                let resolved = resolve_deadline(raw, self.clock.now(), self.default_delay);
                if resolved.is_fallback() {
                    warn!(
                        gift_id,
                        requested = %raw,
                        source = ?resolved.source,
                        deadline = %resolved.deadline,
                        "Requested release time unusable, using default delay"
                    );
                }
                Some(resolved.deadline)
            }
            None => None,
        };

        let custom_message = normalize_message(custom_message);
        self.store
            .set_recipients_and_schedule(gift_id, &recipients, custom_message.as_deref(), release_at)
            .await?;

        let policy = match release_at {
            Some(deadline) => ReleasePolicy::FixedSchedule {
                fallback_deadline: deadline,
            },
            None => ReleasePolicy::Inactivity,
        };
        let label = policy.as_str();

        if self
            .supervisor
            .spawn(ReleaseTarget::Gift { gift_id, policy })
            .is_none()
        {
            warn!(gift_id, "Release not armed now, it will resume on next startup");
        }

        info!(
            gift_id,
            policy = label,
            recipients = recipients.len(),
            "Gift delivery configured"
        );

        Ok(DeliveryAck {
            gift_id,
            policy: label,
            release_at,
        })
    }

    /// Arm an owner-level inactivity check covering all of the owner's pending gifts.
    pub async fn schedule_inactivity_check(
        &self,
        username: &str,
        custom_message: Option<String>,
    ) -> Result<InactivityCheckAck, GiftError> {
        let owner = self.owner(username).await?;
        let pending = self.store.pending_gift_ids_for_owner(owner.id).await?;

        let target = ReleaseTarget::Owner {
            owner_id: owner.id,
            custom_message: normalize_message(custom_message),
        };
        if self.supervisor.spawn(target).is_none() {
            warn!(owner_id = owner.id, "Inactivity check not armed, supervisor stopped");
        }

        info!(
            owner_id = owner.id,
            pending_gifts = pending.len(),
            "Inactivity check scheduled"
        );

        Ok(InactivityCheckAck {
            username: owner.username,
            pending_gifts: pending.len(),
        })
    }

    /// Delete a gift and cancel its release instance.
    pub async fn stop_gift(&self, gift_id: i64) -> Result<(), GiftError> {
        if !self.store.delete_gift(gift_id).await? {
            return Err(GiftError::NotFound(format!("gift {}", gift_id)));
        }

        let cancelled = self.supervisor.cancel_gift(gift_id);
        info!(gift_id, cancelled, "Gift stopped");
        Ok(())
    }

    pub async fn calendar(&self, username: &str) -> Result<Vec<CalendarEvent>, GiftError> {
        let owner = self.owner(username).await?;
        Ok(CalendarProjector::new(self.store.clone())
            .project(owner.id)
            .await?)
    }

    pub async fn list_gifts(&self, username: &str) -> Result<Vec<GiftSummary>, GiftError> {
        let owner = self.owner(username).await?;
        Ok(self.store.list_gifts_for_owner(owner.id).await?)
    }

    pub async fn count_gifts(&self, username: &str) -> Result<i64, GiftError> {
        Ok(self.list_gifts(username).await?.len() as i64)
    }

    pub async fn pending_gifts(&self, username: &str) -> Result<Vec<GiftSummary>, GiftError> {
        let mut gifts = self.list_gifts(username).await?;
        gifts.retain(|gift| gift.pending);
        Ok(gifts)
    }

    pub async fn download_gift(&self, gift_id: i64) -> Result<Gift, GiftError> {
        Ok(self.store.get_gift(gift_id).await?)
    }

    /// Unique recipients across all of the owner's gifts, sorted.
    pub async fn receivers(&self, username: &str) -> Result<Vec<String>, GiftError> {
        let gifts = self.list_gifts(username).await?;
        let unique: BTreeSet<String> = gifts
            .into_iter()
            .flat_map(|gift| gift.recipients.into_inner())
            .collect();
        Ok(unique.into_iter().collect())
    }
}
