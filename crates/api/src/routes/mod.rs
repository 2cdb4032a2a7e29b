//! HTTP route handlers.

pub mod calendar;
pub mod gifts;
pub mod health;
pub mod inactivity;
