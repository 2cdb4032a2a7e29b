//! Domain models for Parting Gift.

pub mod calendar;
pub mod gift;
pub mod owner;

pub use calendar::CalendarEvent;
pub use gift::{Gift, GiftStatus, GiftSummary, Recipients, RecipientsInput};
pub use owner::Owner;
