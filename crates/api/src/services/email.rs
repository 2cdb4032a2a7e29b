//! Email notifier for inactivity probes and gift deliveries.
//!
//! Supports three providers:
//! - `smtp`: Any SMTP relay, STARTTLS by default
//! - `sendgrid`: Uses the SendGrid v3 API
//! - `console`: Logs emails (development, requires `allow_console`)

use base64::{engine::general_purpose::STANDARD, Engine as _};
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use domain::services::{Notifier, NotifyError, OutboundMessage};

use crate::config::EmailConfig;

/// Email service backing the release scheduler's notifier.
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    client: reqwest::Client,
}

impl EmailService {
    /// Creates a new EmailService with the given configuration.
    pub fn new(config: EmailConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    /// Check if email service is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn provider(&self) -> &str {
        &self.config.provider
    }

    /// Console provider - logs the message instead of sending it.
    async fn send_console(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        if !self.config.allow_console {
            return Err(NotifyError::NotConfigured(
                "console provider cannot deliver mail without email.allow_console".to_string(),
            ));
        }
        info!(
            to = ?message.to,
            subject = %message.subject,
            from = %self.config.sender_email,
            attachments = message.attachments.len(),
            "Email (console provider)"
        );
        debug!(body = %message.body, "Email body");
        Ok(())
    }

    /// SMTP provider - one message addressed to every recipient.
    async fn send_smtp(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        if self.config.smtp_host.is_empty() {
            return Err(NotifyError::NotConfigured("smtp_host is empty".to_string()));
        }

        let email = smtp_message(&self.config, message)?;
        let transport = smtp_transport(&self.config)?;

        match transport.send(email).await {
            Ok(_) => {
                info!(
                    recipients = message.to.len(),
                    subject = %message.subject,
                    "Email sent via SMTP"
                );
                Ok(())
            }
            Err(e) if e.is_timeout() => Err(NotifyError::TimedOut),
            Err(e) if e.is_permanent() => {
                error!(error = %e, "SMTP relay rejected message");
                Err(NotifyError::Rejected(format!("SMTP rejected: {}", e)))
            }
            Err(e) => Err(NotifyError::Transport(format!("SMTP send failed: {}", e))),
        }
    }

    /// SendGrid provider - one personalization carrying every recipient.
    async fn send_sendgrid(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        if self.config.sendgrid_api_key.is_empty() {
            return Err(NotifyError::NotConfigured(
                "sendgrid_api_key is empty".to_string(),
            ));
        }

        let response = self
            .client
            .post(&self.config.sendgrid_url)
            .bearer_auth(&self.config.sendgrid_api_key)
            .json(&sendgrid_payload(&self.config, message))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::TimedOut
                } else {
                    NotifyError::Transport(format!("SendGrid request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            info!(
                recipients = message.to.len(),
                subject = %message.subject,
                "Email sent via SendGrid"
            );
            return Ok(());
        }

        let error_body = response.text().await.unwrap_or_default();
        error!(status = %status, error = %error_body, "SendGrid API error");
        let detail = format!("SendGrid returned {}: {}", status, error_body);
        if status.is_client_error() {
            Err(NotifyError::Rejected(detail))
        } else {
            Err(NotifyError::Transport(detail))
        }
    }
}

#[async_trait::async_trait]
impl Notifier for EmailService {
    async fn send(&self, message: OutboundMessage) -> Result<(), NotifyError> {
        if message.to.is_empty() {
            return Err(NotifyError::NoRecipients);
        }
        if !self.config.enabled {
            debug!(subject = %message.subject, "Email service disabled, refusing send");
            return Err(NotifyError::Disabled);
        }

        match self.config.provider.as_str() {
            "smtp" => self.send_smtp(&message).await,
            "sendgrid" => self.send_sendgrid(&message).await,
            "console" => self.send_console(&message).await,
            provider => {
                error!(provider = %provider, "Unknown email provider");
                Err(NotifyError::NotConfigured(format!(
                    "unknown provider {}",
                    provider
                )))
            }
        }
    }
}

fn smtp_transport(config: &EmailConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
    let mut builder = if config.smtp_starttls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host).map_err(|e| {
            NotifyError::NotConfigured(format!("SMTP relay {}: {}", config.smtp_host, e))
        })?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.smtp_host.as_str())
    };

    builder = builder
        .port(config.smtp_port)
        .timeout(Some(Duration::from_secs(config.timeout_secs)));
    if !config.smtp_username.is_empty() {
        builder = builder.credentials(Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.clone(),
        ));
    }

    Ok(builder.build())
}

/// Builds the MIME message: plain text body, attachments as `multipart/mixed`.
fn smtp_message(config: &EmailConfig, message: &OutboundMessage) -> Result<Message, NotifyError> {
    let sender: Address = config
        .sender_email
        .parse()
        .map_err(|e| NotifyError::NotConfigured(format!("invalid sender_email: {}", e)))?;

    let mut builder = Message::builder()
        .from(Mailbox::new(Some(config.sender_name.clone()), sender))
        .subject(message.subject.clone());
    for recipient in &message.to {
        let mailbox: Mailbox = recipient
            .parse()
            .map_err(|e| NotifyError::Rejected(format!("invalid recipient {}: {}", recipient, e)))?;
        builder = builder.to(mailbox);
    }

    let text = SinglePart::plain(message.body.clone());
    let built = if message.attachments.is_empty() {
        builder.singlepart(text)
    } else {
        let mut parts = MultiPart::mixed().singlepart(text);
        for attachment in &message.attachments {
            let mime = mime_guess::from_path(&attachment.name).first_or_octet_stream();
            let content_type = ContentType::parse(mime.essence_str())
                .map_err(|e| NotifyError::Rejected(format!("bad content type: {}", e)))?;
            parts = parts.singlepart(
                MailAttachment::new(attachment.name.clone())
                    .body(attachment.bytes.clone(), content_type),
            );
        }
        builder.multipart(parts)
    };

    built.map_err(|e| NotifyError::Rejected(format!("could not build message: {}", e)))
}

/// Builds the SendGrid v3 mail/send request body.
fn sendgrid_payload(config: &EmailConfig, message: &OutboundMessage) -> Value {
    let to: Vec<Value> = message.to.iter().map(|email| json!({ "email": email })).collect();

    let mut body = json!({
        "personalizations": [{ "to": to }],
        "from": {
            "email": config.sender_email,
            "name": config.sender_name
        },
        "subject": message.subject,
        "content": [{
            "type": "text/plain",
            "value": message.body
        }]
    });

    if !message.attachments.is_empty() {
        let attachments: Vec<Value> = message
            .attachments
            .iter()
            .map(|a| {
                json!({
                    "content": STANDARD.encode(&a.bytes),
                    "filename": a.name,
                    "type": mime_guess::from_path(&a.name).first_or_octet_stream().to_string(),
                    "disposition": "attachment"
                })
            })
            .collect();
        body["attachments"] = Value::Array(attachments);
    }

    body
}
