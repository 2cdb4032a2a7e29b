//! Release scheduler: the per-gift dead man's switch.
//!
//! A [`ReleaseTask`] walks one gift (or all of an owner's pending gifts)
//! through `Armed -> ProbeSent -> Releasing -> Released`, leaving early as
//! `Aborted` or `Failed`. Every wait is a cancellable sleep broken into poll
//! ticks, and the store is re-read at each decision point.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::errors::{GiftError, StoreError};
use crate::models::Gift;
use crate::services::clock::Clock;
use crate::services::liveness::LivenessOracle;
use crate::services::notification::{Notifier, NotifyError, OutboundMessage};
use crate::services::store::{GiftStore, OwnerDirectory};

/// Lifecycle of a release instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseState {
    Armed,
    ProbeSent,
    Releasing,
    Released,
    Aborted,
    Failed,
}

impl ReleaseState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReleaseState::Released | ReleaseState::Aborted | ReleaseState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseState::Armed => "armed",
            ReleaseState::ProbeSent => "probe_sent",
            ReleaseState::Releasing => "releasing",
            ReleaseState::Released => "released",
            ReleaseState::Aborted => "aborted",
            ReleaseState::Failed => "failed",
        }
    }
}

impl fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a gift's release moment is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Release at the stored schedule. The fallback is used only while the
    /// stored value cannot be read.
    FixedSchedule { fallback_deadline: DateTime<Utc> },
    /// Probe the owner after one wait window, release after a second.
    Inactivity,
}

impl ReleasePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleasePolicy::FixedSchedule { .. } => "fixed_schedule",
            ReleasePolicy::Inactivity => "inactivity",
        }
    }
}

/// What a release instance watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseTarget {
    Gift {
        gift_id: i64,
        policy: ReleasePolicy,
    },
    /// Owner-level sweep: inactivity policy over all pending gifts.
    Owner {
        owner_id: i64,
        custom_message: Option<String>,
    },
}

impl fmt::Display for ReleaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseTarget::Gift { gift_id, .. } => write!(f, "gift:{}", gift_id),
            ReleaseTarget::Owner { owner_id, .. } => write!(f, "owner:{}", owner_id),
        }
    }
}

/// Delays and budgets of the release subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseTiming {
    /// Length of each inactivity window.
    pub wait_window: Duration,
    /// Granularity of liveness checks inside a window.
    pub poll_interval: Duration,
    /// Delay applied when a requested schedule is missing, past or unparseable.
    pub default_delay: Duration,
    /// Total send attempts per message, first one included.
    pub max_send_attempts: u32,
    /// Base of the exponential backoff between attempts.
    pub retry_backoff: Duration,
    /// Upper bound on a single notifier call.
    pub notify_timeout: Duration,
}

impl Default for ReleaseTiming {
    fn default() -> Self {
        Self {
            wait_window: Duration::from_secs(60),
            poll_interval: Duration::from_secs(10),
            default_delay: Duration::from_secs(60),
            max_send_attempts: 3,
            retry_backoff: Duration::from_secs(5),
            notify_timeout: Duration::from_secs(30),
        }
    }
}

impl ReleaseTiming {
    /// Pause after the `failed_attempts`-th failure.
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(16);
        self.retry_backoff.saturating_mul(1u32 << exponent)
    }
}

/// Process-wide admission to the `Releasing` step, keyed by gift id.
#[derive(Debug, Clone, Default)]
pub struct ReleaseGate {
    held: Arc<Mutex<HashSet<i64>>>,
}

impl ReleaseGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit the caller unless another instance is releasing this gift.
    /// Callers that are refused wait for the slot rather than give up.
    pub fn try_acquire(&self, gift_id: i64) -> Option<ReleasePermit> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if held.insert(gift_id) {
            Some(ReleasePermit {
                held: Arc::clone(&self.held),
                gift_id,
            })
        } else {
            None
        }
    }

    pub fn is_held(&self, gift_id: i64) -> bool {
        let held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.contains(&gift_id)
    }
}

/// Releases the gate slot on drop.
#[derive(Debug)]
pub struct ReleasePermit {
    held: Arc<Mutex<HashSet<i64>>>,
    gift_id: i64,
}

impl Drop for ReleasePermit {
    fn drop(&mut self) {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.remove(&self.gift_id);
    }
}

/// Collaborators handed to every release instance.
#[derive(Clone)]
pub struct ReleaseContext {
    pub store: Arc<dyn GiftStore>,
    pub owners: Arc<dyn OwnerDirectory>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub timing: ReleaseTiming,
    pub gate: ReleaseGate,
}

/// Why an instance stopped without releasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The instance was cancelled or superseded.
    Cancelled,
    /// The gift was stopped, deleted or released elsewhere.
    NoLongerPending,
    /// Owner sweep found no pending gifts at release time.
    NothingToRelease,
    OwnerNotFound,
}

impl AbortReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortReason::Cancelled => "cancelled",
            AbortReason::NoLongerPending => "no_longer_pending",
            AbortReason::NothingToRelease => "nothing_to_release",
            AbortReason::OwnerNotFound => "owner_not_found",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of a release instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released { gift_ids: Vec<i64> },
    Aborted(AbortReason),
    Failed(GiftError),
}

impl ReleaseOutcome {
    pub fn state(&self) -> ReleaseState {
        match self {
            ReleaseOutcome::Released { .. } => ReleaseState::Released,
            ReleaseOutcome::Aborted(_) => ReleaseState::Aborted,
            ReleaseOutcome::Failed(_) => ReleaseState::Failed,
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        self.state().as_str()
    }
}

/// Early exit from the state machine carrying the final outcome.
type Step<T> = Result<T, ReleaseOutcome>;

fn aborted<T>(reason: AbortReason) -> Step<T> {
    Err(ReleaseOutcome::Aborted(reason))
}

/// Which pending check guards a wait.
#[derive(Debug, Clone, Copy)]
enum Scope {
    /// The instance's own target: the gift, or any gift of the owner.
    Target,
    Gift(i64),
}

/// One release instance.
pub struct ReleaseTask {
    ctx: ReleaseContext,
    target: ReleaseTarget,
    liveness: LivenessOracle,
    state: ReleaseState,
}

impl ReleaseTask {
    pub fn new(ctx: ReleaseContext, target: ReleaseTarget) -> Self {
        let liveness = LivenessOracle::new(Arc::clone(&ctx.store));
        Self {
            ctx,
            target,
            liveness,
            state: ReleaseState::Armed,
        }
    }

    pub fn target(&self) -> &ReleaseTarget {
        &self.target
    }

    pub fn state(&self) -> ReleaseState {
        self.state
    }

    /// Drive the instance to a terminal state.
    pub async fn run(mut self, cancel: CancellationToken) -> ReleaseOutcome {
        let span = tracing::info_span!("release", target = %self.target);

        async move {
            tracing::info!("Release instance armed");
            let outcome = match self.drive(&cancel).await {
                Ok(outcome) | Err(outcome) => outcome,
            };
            self.transition(outcome.state());

            match &outcome {
                ReleaseOutcome::Released { gift_ids } => {
                    tracing::info!(gift_ids = ?gift_ids, "Release completed")
                }
                ReleaseOutcome::Aborted(reason) => {
                    tracing::info!(reason = %reason, "Release aborted")
                }
                ReleaseOutcome::Failed(error) => {
                    tracing::error!(error = %error, "Release failed")
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn drive(&mut self, cancel: &CancellationToken) -> Step<ReleaseOutcome> {
        match self.target.clone() {
            ReleaseTarget::Gift {
                gift_id,
                policy: ReleasePolicy::FixedSchedule { fallback_deadline },
            } => {
                self.await_deadline(gift_id, fallback_deadline, cancel).await?;
                self.confirm_live(Scope::Target, cancel).await?;
                self.transition(ReleaseState::Releasing);
                let released = self.release_gift(gift_id, None, cancel).await?;
                Ok(ReleaseOutcome::Released {
                    gift_ids: vec![released],
                })
            }
            ReleaseTarget::Gift {
                gift_id,
                policy: ReleasePolicy::Inactivity,
            } => {
                self.inactivity_cycle(cancel).await?;
                let released = self.release_gift(gift_id, None, cancel).await?;
                Ok(ReleaseOutcome::Released {
                    gift_ids: vec![released],
                })
            }
            ReleaseTarget::Owner {
                owner_id,
                custom_message,
            } => {
                self.inactivity_cycle(cancel).await?;
                self.release_owner(owner_id, custom_message.as_deref(), cancel)
                    .await
            }
        }
    }

    fn transition(&mut self, next: ReleaseState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "Release state transition");
            self.state = next;
        }
    }

    /// Window, probe, second window. Ends in `Releasing`.
    async fn inactivity_cycle(&mut self, cancel: &CancellationToken) -> Step<()> {
        let window = self.ctx.timing.wait_window;

        self.confirm_live(Scope::Target, cancel).await?;
        self.hold(window, cancel).await?;
        self.confirm_live(Scope::Target, cancel).await?;

        let contact = self.owner_contact(cancel).await?;
        self.send_with_retry(OutboundMessage::probe(&contact), Scope::Target, cancel)
            .await?;
        tracing::info!(contact = %contact, "Inactivity probe sent");
        self.transition(ReleaseState::ProbeSent);

        self.confirm_live(Scope::Target, cancel).await?;
        self.hold(window, cancel).await?;
        self.confirm_live(Scope::Target, cancel).await?;

        self.transition(ReleaseState::Releasing);
        Ok(())
    }

    /// Sleep that yields `Aborted(Cancelled)` when the token fires first.
    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> Step<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => aborted(AbortReason::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    async fn still_pending(&self, scope: Scope) -> Result<bool, StoreError> {
        match (scope, &self.target) {
            (Scope::Gift(gift_id), _) => self.liveness.is_pending(gift_id).await,
            (Scope::Target, ReleaseTarget::Gift { gift_id, .. }) => {
                self.liveness.is_pending(*gift_id).await
            }
            (Scope::Target, ReleaseTarget::Owner { owner_id, .. }) => {
                self.liveness.has_any_pending(*owner_id).await
            }
        }
    }

    /// Wait out `window` in poll ticks, aborting as soon as the target is no
    /// longer pending. Store errors only delay the check to the next tick.
    async fn hold(&self, window: Duration, cancel: &CancellationToken) -> Step<()> {
        let deadline = Instant::now() + window;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let tick = self.ctx.timing.poll_interval.min(deadline - now);
            self.pause(tick, cancel).await?;

            match self.still_pending(Scope::Target).await {
                Ok(true) => {}
                Ok(false) => return aborted(AbortReason::NoLongerPending),
                Err(e) => tracing::warn!(error = %e, "Liveness check failed, continuing to wait"),
            }
        }
    }

    /// Definitive pending check at a decision point. Re-polls on store errors.
    async fn confirm_live(&self, scope: Scope, cancel: &CancellationToken) -> Step<()> {
        loop {
            if cancel.is_cancelled() {
                return aborted(AbortReason::Cancelled);
            }
            match self.still_pending(scope).await {
                Ok(true) => return Ok(()),
                Ok(false) => return aborted(AbortReason::NoLongerPending),
                Err(e) => {
                    tracing::warn!(error = %e, "Liveness unknown at decision point, re-polling");
                    self.pause(self.ctx.timing.poll_interval, cancel).await?;
                }
            }
        }
    }

    /// Sleep until the stored release time, re-read on every tick.
    async fn await_deadline(
        &self,
        gift_id: i64,
        fallback_deadline: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Step<()> {
        let mut deadline = fallback_deadline;
        loop {
            match self.ctx.store.get_status(gift_id).await {
                Ok(status) if !status.pending => return aborted(AbortReason::NoLongerPending),
                Ok(status) => {
                    if let Some(live) = status.scheduled_release {
                        if live != deadline {
                            tracing::debug!(deadline = %live, "Using stored release time");
                        }
                        deadline = live;
                    }
                }
                Err(e) if e.is_not_found() => return aborted(AbortReason::NoLongerPending),
                Err(e) => {
                    tracing::warn!(error = %e, deadline = %deadline, "Could not re-read schedule")
                }
            }

            let now = self.ctx.clock.now();
            if now >= deadline {
                return Ok(());
            }
            let remaining = (deadline - now).to_std().unwrap_or(Duration::ZERO);
            self.pause(remaining.min(self.ctx.timing.poll_interval), cancel)
                .await?;
        }
    }

    async fn owner_id(&self, cancel: &CancellationToken) -> Step<i64> {
        match &self.target {
            ReleaseTarget::Owner { owner_id, .. } => Ok(*owner_id),
            ReleaseTarget::Gift { gift_id, .. } => loop {
                match self.ctx.store.get_status(*gift_id).await {
                    Ok(status) => return Ok(status.owner_id),
                    Err(e) if e.is_not_found() => return aborted(AbortReason::NoLongerPending),
                    Err(e) => {
                        tracing::warn!(error = %e, "Could not read gift owner, re-polling");
                        self.pause(self.ctx.timing.poll_interval, cancel).await?;
                    }
                }
            },
        }
    }

    async fn owner_contact(&self, cancel: &CancellationToken) -> Step<String> {
        let owner_id = self.owner_id(cancel).await?;
        loop {
            match self.ctx.owners.primary_contact(owner_id).await {
                Ok(contact) => return Ok(contact),
                Err(e) if e.is_not_found() => return aborted(AbortReason::OwnerNotFound),
                Err(e) => {
                    tracing::warn!(owner_id, error = %e, "Could not read primary contact, re-polling");
                    self.pause(self.ctx.timing.poll_interval, cancel).await?;
                }
            }
        }
    }

    /// Send with exponential backoff, re-checking liveness before each retry.
    async fn send_with_retry(
        &self,
        message: OutboundMessage,
        scope: Scope,
        cancel: &CancellationToken,
    ) -> Step<()> {
        let timing = self.ctx.timing;
        let attempts = timing.max_send_attempts.max(1);
        let mut last_error = NotifyError::TimedOut;

        for attempt in 1..=attempts {
            if attempt > 1 {
                self.pause(timing.backoff(attempt - 1), cancel).await?;
                self.confirm_live(scope, cancel).await?;
            }

            let result =
                tokio::time::timeout(timing.notify_timeout, self.ctx.notifier.send(message.clone()))
                    .await
                    .unwrap_or(Err(NotifyError::TimedOut));

            match result {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        subject = %message.subject,
                        error = %e,
                        "Send attempt failed"
                    );
                    last_error = e;
                }
            }
        }

        Err(ReleaseOutcome::Failed(GiftError::DeliveryFailure(
            last_error.to_string(),
        )))
    }

    async fn read_gift(&self, gift_id: i64, cancel: &CancellationToken) -> Step<Gift> {
        loop {
            match self.ctx.store.get_gift(gift_id).await {
                Ok(gift) => return Ok(gift),
                Err(e) if e.is_not_found() => return aborted(AbortReason::NoLongerPending),
                Err(e) => {
                    tracing::warn!(gift_id, error = %e, "Could not read gift, re-polling");
                    self.pause(self.ctx.timing.poll_interval, cancel).await?;
                }
            }
        }
    }

    /// Wait in poll ticks until no other instance is releasing the gift.
    /// The holder may still fail its send, so the gift is re-read afterwards.
    async fn acquire_gate(&self, gift_id: i64, cancel: &CancellationToken) -> Step<ReleasePermit> {
        loop {
            if let Some(permit) = self.ctx.gate.try_acquire(gift_id) {
                return Ok(permit);
            }
            tracing::debug!(gift_id, "Release gate held by another instance, waiting");
            self.pause(self.ctx.timing.poll_interval, cancel).await?;
        }
    }

    /// Send one gift to its live recipients and flip it to released.
    async fn release_gift(
        &self,
        gift_id: i64,
        message_override: Option<&str>,
        cancel: &CancellationToken,
    ) -> Step<i64> {
        let _permit = self.acquire_gate(gift_id, cancel).await?;

        let gift = self.read_gift(gift_id, cancel).await?;
        if !gift.pending {
            return aborted(AbortReason::NoLongerPending);
        }
        if gift.recipients.is_empty() {
            return Err(ReleaseOutcome::Failed(GiftError::InvalidInput(format!(
                "gift {} has no recipients",
                gift_id
            ))));
        }

        let body = message_override.unwrap_or(&gift.custom_message);
        let message = OutboundMessage::delivery(
            gift.recipients.as_slice(),
            body,
            &gift.file_name,
            gift.file_data,
        );
        self.send_with_retry(message, Scope::Gift(gift_id), cancel)
            .await?;
        tracing::info!(gift_id, recipients = gift.recipients.len(), "Gift delivered");

        self.commit_release(gift_id).await
    }

    /// Flip `pending` after a successful send. Not cancellable: the mail is out.
    async fn commit_release(&self, gift_id: i64) -> Step<i64> {
        let timing = self.ctx.timing;
        let attempts = timing.max_send_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(timing.backoff(attempt - 1)).await;
            }
            match self.ctx.store.mark_released(gift_id).await {
                Ok(true) => return Ok(gift_id),
                Ok(false) => {
                    tracing::warn!(gift_id, "Gift deleted while being delivered");
                    return aborted(AbortReason::NoLongerPending);
                }
                Err(e) => {
                    tracing::warn!(gift_id, attempt, error = %e, "Could not mark gift released");
                    last_error = Some(e);
                }
            }
        }

        let error = last_error
            .map(GiftError::from)
            .unwrap_or_else(|| GiftError::Store("mark released failed".to_string()));
        Err(ReleaseOutcome::Failed(error))
    }

    /// Release every pending gift of the owner, each under its own guards.
    async fn release_owner(
        &self,
        owner_id: i64,
        custom_message: Option<&str>,
        cancel: &CancellationToken,
    ) -> Step<ReleaseOutcome> {
        let gift_ids = loop {
            match self.ctx.store.pending_gift_ids_for_owner(owner_id).await {
                Ok(ids) => break ids,
                Err(e) => {
                    tracing::warn!(error = %e, "Could not list pending gifts, re-polling");
                    self.pause(self.ctx.timing.poll_interval, cancel).await?;
                }
            }
        };
        if gift_ids.is_empty() {
            return aborted(AbortReason::NothingToRelease);
        }

        let mut released = Vec::with_capacity(gift_ids.len());
        let mut first_miss = None;
        for gift_id in gift_ids {
            if cancel.is_cancelled() {
                first_miss.get_or_insert(ReleaseOutcome::Aborted(AbortReason::Cancelled));
                break;
            }
            match self.release_gift(gift_id, custom_message, cancel).await {
                Ok(id) => released.push(id),
                Err(outcome) => {
                    tracing::warn!(gift_id, outcome = ?outcome, "Gift not released in owner sweep");
                    first_miss.get_or_insert(outcome);
                }
            }
        }

        if released.is_empty() {
            Err(first_miss.unwrap_or(ReleaseOutcome::Aborted(AbortReason::NothingToRelease)))
        } else {
            Ok(ReleaseOutcome::Released { gift_ids: released })
        }
    }
}
