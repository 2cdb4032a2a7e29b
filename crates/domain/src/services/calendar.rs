//! Calendar projection of an owner's gifts.

use std::sync::Arc;

use crate::errors::StoreError;
use crate::models::calendar::{CalendarEvent, DEFAULT_TITLE};
use crate::models::GiftSummary;
use crate::services::store::GiftStore;

/// Read-only projector from stored gifts to calendar events.
#[derive(Clone)]
pub struct CalendarProjector {
    store: Arc<dyn GiftStore>,
}

impl CalendarProjector {
    pub fn new(store: Arc<dyn GiftStore>) -> Self {
        Self { store }
    }

    /// Every gift of the owner, dated ones first by release time.
    pub async fn project(&self, owner_id: i64) -> Result<Vec<CalendarEvent>, StoreError> {
        let gifts = self.store.list_gifts_for_owner(owner_id).await?;
        Ok(project_events(gifts))
    }
}

/// Orders gifts by release date ascending with undated gifts last, keeping
/// store order among equals.
pub fn project_events(mut gifts: Vec<GiftSummary>) -> Vec<CalendarEvent> {
    gifts.sort_by_key(|g| (g.scheduled_release.is_none(), g.scheduled_release));
    gifts.into_iter().map(to_event).collect()
}

fn to_event(gift: GiftSummary) -> CalendarEvent {
    let title = if gift.file_name.trim().is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        gift.file_name
    };

    CalendarEvent {
        id: gift.id,
        title,
        release_date: gift.scheduled_release,
        message: gift.custom_message,
        is_pending: gift.pending,
        receivers: gift.recipients.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Recipients;
    use chrono::{Duration, Utc};

    fn summary(id: i64, file_name: &str, offset_hours: Option<i64>) -> GiftSummary {
        let now = Utc::now();
        GiftSummary {
            id,
            owner_id: 1,
            file_name: file_name.to_string(),
            custom_message: format!("message {}", id),
            recipients: Recipients::parse("a@x.com"),
            pending: true,
            scheduled_release: offset_hours.map(|h| now + Duration::hours(h)),
            created_at: now,
            size_bytes: 0,
        }
    }

    #[test]
    fn test_events_ordered_with_undated_last() {
        let events = project_events(vec![
            summary(1, "a", None),
            summary(2, "b", Some(5)),
            summary(3, "c", None),
            summary(4, "d", Some(1)),
        ]);

        let ids: Vec<i64> = events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![4, 2, 1, 3]);
    }

    #[test]
    fn test_blank_title_falls_back() {
        let events = project_events(vec![summary(1, "", None), summary(2, "will.pdf", None)]);
        assert_eq!(events[0].title, "Gift");
        assert_eq!(events[1].title, "will.pdf");
        assert_eq!(events[0].message, "message 1");
        assert_eq!(events[0].receivers, vec!["a@x.com"]);
    }

    #[tokio::test]
    async fn test_project_reads_store() {
        use crate::services::memory::InMemoryGiftStore;

        let store = Arc::new(InMemoryGiftStore::new());
        store.create_gift(1, "one", b"", "").await.unwrap();
        store.create_gift(2, "other", b"", "").await.unwrap();

        let projector = CalendarProjector::new(store);
        let events = projector.project(1).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "one");
        assert!(events[0].release_date.is_none());
    }
}
