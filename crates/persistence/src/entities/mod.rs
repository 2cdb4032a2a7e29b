//! Entity definitions (database row mappings).

pub mod gift;
pub mod user;

pub use gift::{GiftEntity, GiftStatusEntity, GiftSummaryEntity};
pub use user::UserEntity;
