//! Notification service for outbound gift messages.
//!
//! Provides the abstraction the release scheduler uses to reach owners and
//! recipients, plus the two message templates it sends.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Subject line of the inactivity probe sent to the owner.
pub const PROBE_SUBJECT: &str = "Are you still alive? Your gifts will be sent soon";

/// Subject line of a released gift.
pub const DELIVERY_SUBJECT: &str = "Your Parting Gift";

const PROBE_BODY: &str = "Hello,\n\nWe noticed you haven't been active recently. \
If you are still there, please log in and click the 'Stop' button to cancel the gift sending process.";

/// A file attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A fully rendered outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

impl OutboundMessage {
    /// The warning sent to the owner before a release.
    pub fn probe(primary_contact: &str) -> Self {
        Self {
            to: vec![primary_contact.to_string()],
            subject: PROBE_SUBJECT.to_string(),
            body: PROBE_BODY.to_string(),
            attachments: Vec::new(),
        }
    }

    /// The gift itself. An empty message falls back to a body naming the file.
    pub fn delivery(to: &[String], custom_message: &str, file_name: &str, bytes: Vec<u8>) -> Self {
        let body = if custom_message.trim().is_empty() {
            format!("Hello,\n\nPlease find attached your parting gift: {}", file_name)
        } else {
            custom_message.to_string()
        };

        Self {
            to: to.to_vec(),
            subject: DELIVERY_SUBJECT.to_string(),
            body,
            attachments: vec![Attachment {
                name: file_name.to_string(),
                bytes,
            }],
        }
    }
}

/// Reasons a send can fail. None of them are retried inside the notifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Message has no recipients")]
    NoRecipients,

    #[error("Email delivery is disabled")]
    Disabled,

    #[error("Email provider not configured: {0}")]
    NotConfigured(String),

    #[error("Provider rejected message: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Send timed out")]
    TimedOut,
}

/// Sends one message to all its recipients, atomically from the caller's view.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<(), NotifyError>;
}

/// Mock notifier for development and testing.
///
/// Records every accepted message. Can be told to fail the next N sends or
/// every send, and to take a while doing it.
#[derive(Debug, Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<OutboundMessage>>,
    attempts: AtomicUsize,
    fail_next: AtomicUsize,
    latency_ms: AtomicU64,
    always_fail: bool,
}

impl MockNotifier {
    /// Create a new mock notifier that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock notifier that rejects every send.
    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    /// Fail the next `count` sends, then succeed.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Make every send take `latency` before it succeeds or fails.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }

    /// Messages accepted so far.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Accepted messages carrying the given subject.
    pub fn sent_with_subject(&self, subject: &str) -> Vec<OutboundMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.subject == subject)
            .collect()
    }

    /// Total send calls, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, message: OutboundMessage) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if message.to.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let forced = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if self.always_fail || forced {
            tracing::warn!(
                subject = %message.subject,
                recipients = message.to.len(),
                "Mock notifier simulating failure"
            );
            return Err(NotifyError::Transport("Simulated failure".to_string()));
        }

        tracing::info!(
            subject = %message.subject,
            recipients = message.to.len(),
            attachments = message.attachments.len(),
            "Mock: Would send message"
        );

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_template() {
        let message = OutboundMessage::probe("owner@example.com");
        assert_eq!(message.to, vec!["owner@example.com"]);
        assert_eq!(message.subject, PROBE_SUBJECT);
        assert!(message.body.contains("'Stop' button"));
        assert!(message.attachments.is_empty());
    }

    #[test]
    fn test_delivery_template_uses_custom_message() {
        let to = vec!["a@x.com".to_string()];
        let message = OutboundMessage::delivery(&to, "Goodbye", "letter.pdf", vec![1, 2]);
        assert_eq!(message.subject, "Your Parting Gift");
        assert_eq!(message.body, "Goodbye");
        assert_eq!(message.attachments[0].name, "letter.pdf");
        assert_eq!(message.attachments[0].bytes, vec![1, 2]);
    }

    #[test]
    fn test_delivery_template_default_body() {
        let to = vec!["a@x.com".to_string()];
        let message = OutboundMessage::delivery(&to, "  ", "letter.pdf", vec![]);
        assert_eq!(
            message.body,
            "Hello,\n\nPlease find attached your parting gift: letter.pdf"
        );
    }

    #[tokio::test]
    async fn test_mock_notifier_records() {
        let notifier = MockNotifier::new();
        notifier
            .send(OutboundMessage::probe("owner@example.com"))
            .await
            .unwrap();

        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(notifier.sent_with_subject(PROBE_SUBJECT).len(), 1);
        assert_eq!(notifier.attempts(), 1);
    }

    #[tokio::test]
    async fn test_mock_notifier_rejects_empty_recipients() {
        let notifier = MockNotifier::new();
        let message = OutboundMessage::delivery(&[], "", "f", vec![]);
        assert_eq!(
            notifier.send(message).await.unwrap_err(),
            NotifyError::NoRecipients
        );
    }

    #[tokio::test]
    async fn test_mock_notifier_fail_next() {
        let notifier = MockNotifier::new();
        notifier.fail_next(1);

        assert!(notifier.send(OutboundMessage::probe("o@x.com")).await.is_err());
        assert!(notifier.send(OutboundMessage::probe("o@x.com")).await.is_ok());
        assert_eq!(notifier.attempts(), 2);
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_notifier_latency() {
        let notifier = MockNotifier::new();
        notifier.set_latency(Duration::from_secs(20));
        let started = tokio::time::Instant::now();

        notifier
            .send(OutboundMessage::probe("o@x.com"))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_mock_notifier_failing() {
        let notifier = MockNotifier::failing();
        let result = notifier.send(OutboundMessage::probe("o@x.com")).await;
        assert!(matches!(result, Err(NotifyError::Transport(_))));
    }
}
