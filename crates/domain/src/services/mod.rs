//! Domain services for Parting Gift.
//!
//! Services contain the release logic and the capabilities it depends on.

pub mod calendar;
pub mod clock;
pub mod liveness;
pub mod memory;
pub mod notification;
pub mod release;
pub mod store;

pub use calendar::CalendarProjector;
pub use clock::{AnchoredClock, Clock, SystemClock};
pub use liveness::LivenessOracle;
pub use memory::{InMemoryGiftStore, InMemoryOwnerDirectory};
pub use notification::{Attachment, MockNotifier, Notifier, NotifyError, OutboundMessage};
pub use release::{
    AbortReason, ReleaseContext, ReleaseGate, ReleaseOutcome, ReleasePolicy, ReleaseState,
    ReleaseTarget, ReleaseTask, ReleaseTiming,
};
pub use store::{GiftStore, OwnerDirectory};
