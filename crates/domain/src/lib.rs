//! Domain layer for the Parting Gift backend.
//!
//! This crate contains:
//! - Domain models (Gift, Recipients, Owner, CalendarEvent)
//! - The release scheduler and the store/notifier capabilities it uses
//! - Domain error types

pub mod errors;
pub mod models;
pub mod services;
