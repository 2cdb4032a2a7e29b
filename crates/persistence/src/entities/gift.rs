//! Gift entities (database row mappings).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use domain::models::{Gift, GiftStatus, GiftSummary, Recipients};

/// Full row of the gifts table, payload included.
#[derive(Debug, Clone, FromRow)]
pub struct GiftEntity {
    pub id: i64,
    pub user_id: i64,
    pub file_name: String,
    pub file_data: Vec<u8>,
    pub custom_message: String,
    /// Comma-delimited recipient list.
    pub receivers: String,
    pub pending: bool,
    pub scheduled_release: Option<DateTime<Utc>>,
    pub upload_time: DateTime<Utc>,
}

impl From<GiftEntity> for Gift {
    fn from(entity: GiftEntity) -> Self {
        Self {
            id: entity.id,
            owner_id: entity.user_id,
            file_name: entity.file_name,
            file_data: entity.file_data,
            custom_message: entity.custom_message,
            recipients: Recipients::parse(&entity.receivers),
            pending: entity.pending,
            scheduled_release: entity.scheduled_release,
            created_at: entity.upload_time,
        }
    }
}

/// Columns polled by the release scheduler.
#[derive(Debug, Clone, FromRow)]
pub struct GiftStatusEntity {
    pub id: i64,
    pub user_id: i64,
    pub pending: bool,
    pub scheduled_release: Option<DateTime<Utc>>,
    pub receivers: String,
}

impl From<GiftStatusEntity> for GiftStatus {
    fn from(entity: GiftStatusEntity) -> Self {
        Self {
            id: entity.id,
            owner_id: entity.user_id,
            pending: entity.pending,
            scheduled_release: entity.scheduled_release,
            recipients: Recipients::parse(&entity.receivers),
        }
    }
}

/// Gift row without the payload; `size_bytes` is computed in SQL.
#[derive(Debug, Clone, FromRow)]
pub struct GiftSummaryEntity {
    pub id: i64,
    pub user_id: i64,
    pub file_name: String,
    pub custom_message: String,
    pub receivers: String,
    pub pending: bool,
    pub scheduled_release: Option<DateTime<Utc>>,
    pub upload_time: DateTime<Utc>,
    pub size_bytes: i64,
}

impl From<GiftSummaryEntity> for GiftSummary {
    fn from(entity: GiftSummaryEntity) -> Self {
        Self {
            id: entity.id,
            owner_id: entity.user_id,
            file_name: entity.file_name,
            custom_message: entity.custom_message,
            recipients: Recipients::parse(&entity.receivers),
            pending: entity.pending,
            scheduled_release: entity.scheduled_release,
            created_at: entity.upload_time,
            size_bytes: entity.size_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_gift_entity() -> GiftEntity {
        GiftEntity {
            id: 7,
            user_id: 1,
            file_name: "letter.pdf".to_string(),
            file_data: vec![1, 2, 3],
            custom_message: "With love".to_string(),
            receivers: "a@x.com, b@x.com,".to_string(),
            pending: true,
            scheduled_release: None,
            upload_time: Utc::now(),
        }
    }

    #[test]
    fn test_gift_entity_to_domain() {
        let entity = create_test_gift_entity();
        let gift: Gift = entity.clone().into();

        assert_eq!(gift.id, 7);
        assert_eq!(gift.owner_id, 1);
        assert_eq!(gift.recipients.as_slice(), &["a@x.com", "b@x.com"]);
        assert_eq!(gift.created_at, entity.upload_time);
        assert!(gift.scheduled_release.is_none());
    }

    #[test]
    fn test_unconfigured_receivers_are_empty() {
        let mut entity = create_test_gift_entity();
        entity.receivers = String::new();
        let gift: Gift = entity.into();
        assert!(gift.recipients.is_empty());
    }

    #[test]
    fn test_status_entity_to_domain() {
        let status: GiftStatus = GiftStatusEntity {
            id: 9,
            user_id: 2,
            pending: false,
            scheduled_release: Some(Utc::now()),
            receivers: "c@x.com".to_string(),
        }
        .into();

        assert_eq!(status.owner_id, 2);
        assert!(!status.pending);
        assert_eq!(status.recipients.len(), 1);
    }

    #[test]
    fn test_summary_entity_to_domain() {
        let summary: GiftSummary = GiftSummaryEntity {
            id: 3,
            user_id: 1,
            file_name: "photo.jpg".to_string(),
            custom_message: String::new(),
            receivers: "a@x.com".to_string(),
            pending: true,
            scheduled_release: None,
            upload_time: Utc::now(),
            size_bytes: 2048,
        }
        .into();

        assert_eq!(summary.size_bytes, 2048);
        assert_eq!(summary.file_name, "photo.jpg");
    }
}
