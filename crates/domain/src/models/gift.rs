//! Gift domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use shared::validation::MAX_CUSTOM_MESSAGE_LENGTH;

/// Ordered list of recipient addresses.
///
/// Parsing a delimited string splits on commas, trims whitespace and drops
/// empty segments. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipients(Vec<String>);

impl Recipients {
    /// Builds a recipient list from individual entries, dropping blank ones.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            entries
                .into_iter()
                .map(|e| e.as_ref().trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        )
    }

    /// Parses a comma-delimited list.
    pub fn parse(delimited: &str) -> Self {
        Self::new(delimited.split(','))
    }

    /// Encodes the list as a comma-delimited string for storage.
    pub fn to_delimited(&self) -> String {
        self.0.join(",")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl<'a> IntoIterator for &'a Recipients {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Recipients as clients send them: either one delimited string or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecipientsInput {
    Delimited(String),
    List(Vec<String>),
}

impl From<RecipientsInput> for Recipients {
    fn from(input: RecipientsInput) -> Self {
        match input {
            RecipientsInput::Delimited(s) => Recipients::parse(&s),
            RecipientsInput::List(list) => Recipients::new(list),
        }
    }
}

/// A file-plus-message payload awaiting release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gift {
    pub id: i64,
    pub owner_id: i64,
    pub file_name: String,
    pub file_data: Vec<u8>,
    pub custom_message: String,
    pub recipients: Recipients,
    /// True until released or stopped.
    pub pending: bool,
    /// Absent means release is governed by inactivity detection.
    pub scheduled_release: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Gift {
    pub fn status(&self) -> GiftStatus {
        GiftStatus {
            id: self.id,
            owner_id: self.owner_id,
            pending: self.pending,
            scheduled_release: self.scheduled_release,
            recipients: self.recipients.clone(),
        }
    }

    pub fn summary(&self) -> GiftSummary {
        GiftSummary {
            id: self.id,
            owner_id: self.owner_id,
            file_name: self.file_name.clone(),
            custom_message: self.custom_message.clone(),
            recipients: self.recipients.clone(),
            pending: self.pending,
            scheduled_release: self.scheduled_release,
            created_at: self.created_at,
            size_bytes: self.file_data.len() as i64,
        }
    }
}

/// The slice of a gift that the release scheduler polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftStatus {
    pub id: i64,
    pub owner_id: i64,
    pub pending: bool,
    pub scheduled_release: Option<DateTime<Utc>>,
    pub recipients: Recipients,
}

/// A gift without its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftSummary {
    pub id: i64,
    #[serde(skip)]
    pub owner_id: i64,
    pub file_name: String,
    pub custom_message: String,
    pub recipients: Recipients,
    pub pending: bool,
    pub scheduled_release: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub size_bytes: i64,
}

/// Request payload for configuring how a gift is delivered.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureDeliveryRequest {
    pub receivers: RecipientsInput,

    #[validate(length(max = 10000, message = "Custom message must be at most 10000 characters"))]
    pub custom_message: Option<String>,

    /// RFC 3339 or `YYYY-MM-DDTHH:MM`. Unparseable values fall back to the default delay.
    pub scheduled_time: Option<String>,
}

/// Request payload for scheduling an owner-level inactivity check.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInactivityRequest {
    #[validate(length(min = 1, max = 64, message = "Username must be 1-64 characters"))]
    pub username: String,

    #[validate(length(max = 10000, message = "Custom message must be at most 10000 characters"))]
    pub custom_message: Option<String>,
}

/// Response payload after a gift upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadGiftResponse {
    pub message: String,
    pub gift_id: i64,
}

/// Response payload for the gift count endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftCountResponse {
    pub count: i64,
}

/// Response payload listing gifts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGiftsResponse {
    pub gifts: Vec<GiftSummary>,
    pub total: i64,
}

/// Trims a custom message, treating blank input as absent.
pub fn normalize_message(message: Option<String>) -> Option<String> {
    message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .map(|m| m.chars().take(MAX_CUSTOM_MESSAGE_LENGTH).collect())
}
