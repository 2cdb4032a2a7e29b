//! Owner domain model.
//!
//! Only the fields the release subsystem reads. Account management lives in
//! the user store and is not modelled here.

use serde::Serialize;

/// The user who uploaded a gift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: i64,
    pub username: String,
    /// Target of the inactivity probe.
    pub primary_contact_email: String,
}
