//! Calendar view of an owner's gifts.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Title shown for gifts without a file name.
pub const DEFAULT_TITLE: &str = "Gift";

/// One entry in an owner's release timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: i64,
    pub title: String,
    /// Absent for inactivity-governed gifts.
    pub release_date: Option<DateTime<Utc>>,
    pub message: String,
    pub is_pending: bool,
    pub receivers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_event_serialization() {
        let event = CalendarEvent {
            id: 3,
            title: DEFAULT_TITLE.to_string(),
            release_date: None,
            message: String::new(),
            is_pending: true,
            receivers: vec!["a@x.com".to_string()],
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["title"], "Gift");
        assert_eq!(json["isPending"], true);
        assert!(json["releaseDate"].is_null());
        assert_eq!(json["receivers"][0], "a@x.com");
    }
}
