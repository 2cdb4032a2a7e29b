//! Repository implementations for database operations.

pub mod gift;
pub mod user;

pub use gift::GiftRepository;
pub use user::UserRepository;
