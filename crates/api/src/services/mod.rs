//! Application services and external integrations.

pub mod email;
pub mod gift_delivery;

pub use email::EmailService;
pub use gift_delivery::{DeliveryAck, GiftDeliveryService, InactivityCheckAck};
