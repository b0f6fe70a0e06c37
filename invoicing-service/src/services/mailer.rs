//! SMTP transport, recipient hygiene, and default email drafts.

use crate::config::SmtpConfig;
use crate::models::{Client, Invoice, Issuer};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use service_core::error::AppError;
use std::time::Duration;
use uuid::Uuid;

/// Split, trim, drop empties, and deduplicate while preserving order.
/// Accepts comma-joined entries inside a single element.
pub fn normalize_email_list(values: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for value in values {
        for part in value.split(',') {
            let trimmed = part.trim();
            if !trimmed.is_empty() && !seen.iter().any(|s| s == trimmed) {
                seen.push(trimmed.to_string());
            }
        }
    }
    seen
}

/// Practical (not full-RFC) address check.
pub fn is_valid_email(address: &str) -> bool {
    let s = address.trim();
    if s.is_empty() || s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Check all recipient lists before any network activity. Returns
/// `InvalidRecipients` naming every offending address.
pub fn validate_recipients(to: &[String], cc: &[String], bcc: &[String]) -> Result<(), AppError> {
    if to.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "At least one recipient is required"
        )));
    }
    let invalid: Vec<String> = to
        .iter()
        .chain(cc)
        .chain(bcc)
        .filter(|addr| !is_valid_email(addr))
        .cloned()
        .collect();
    if invalid.is_empty() {
        Ok(())
    } else {
        Err(AppError::InvalidRecipients(invalid))
    }
}

/// Pre-filled compose form for the one-click send and remind actions.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDraft {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body_text: String,
}

/// Deterministic default draft derived from the invoice and issuer.
pub fn default_draft(invoice: &Invoice, client: &Client, issuer: &Issuer, from: &str) -> EmailDraft {
    let display_name = issuer.display_name();
    let to = client
        .email
        .as_deref()
        .map(|e| vec![e.to_string()])
        .unwrap_or_default();

    let body_text = format!(
        "Hi {},\n\nPlease find your invoice (#{}) attached.\n\nThanks,\n{}",
        client.name, invoice.invoice_number, display_name
    );

    EmailDraft {
        from: from.to_string(),
        to,
        cc: Vec::new(),
        bcc: Vec::new(),
        subject: format!("Invoice #{} from {}", invoice.invoice_number, display_name),
        body_text,
    }
}

/// Draft for the remind action on an already-sent invoice.
pub fn reminder_draft(
    invoice: &Invoice,
    client: &Client,
    issuer: &Issuer,
    from: &str,
) -> EmailDraft {
    let display_name = issuer.display_name();
    let mut draft = default_draft(invoice, client, issuer, from);
    draft.subject = format!(
        "Reminder: invoice #{} from {}",
        invoice.invoice_number, display_name
    );
    draft.body_text = format!(
        "Hi {},\n\nThis is a friendly reminder that invoice #{} was due on {}. \
         A copy is attached.\n\nThanks,\n{}",
        client.name,
        invoice.invoice_number,
        invoice.due_date.format("%d %b %Y"),
        display_name
    );
    draft
}

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Fully-resolved outbound message.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body_text: String,
    pub attachment: Option<EmailAttachment>,
}

/// What the transport reported for one delivery.
#[derive(Debug, Clone)]
pub struct MailOutcome {
    pub message_id: String,
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub response: String,
}

/// SMTP-compatible delivery seam. `verify` is the preflight handshake; `send`
/// only runs after a successful verify.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Configuration keys the transport is missing when it cannot send at
    /// all. Checked before recipients, so an unconfigured transport fails
    /// without touching the audit log.
    fn missing_config(&self) -> Option<Vec<String>> {
        None
    }
    async fn verify(&self) -> Result<(), AppError>;
    async fn send(&self, email: &OutgoingEmail) -> Result<MailOutcome, AppError>;
}

/// Production transport over lettre.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build from validated configuration. Missing settings fail here, once,
    /// at startup, with the absent keys named.
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let mut missing = Vec::new();
        if config.host.trim().is_empty() {
            missing.push("SMTP_HOST".to_string());
        }
        if config.port == 0 {
            missing.push("SMTP_PORT".to_string());
        }
        if config.user.trim().is_empty() {
            missing.push("SMTP_USER".to_string());
        }
        if config.password.trim().is_empty() {
            missing.push("SMTP_PASSWORD".to_string());
        }
        if config.from_email.trim().is_empty() {
            missing.push("SMTP_FROM_EMAIL".to_string());
        }
        if !missing.is_empty() {
            return Err(AppError::EmailNotConfigured(missing));
        }

        let creds = Credentials::new(config.user.clone(), config.password.clone());

        // Port 465 is implicit TLS; everything else negotiates STARTTLS.
        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("SMTP relay: {}", e)))?;

        let transport = builder
            .port(config.port)
            .credentials(creds)
            // lettre exposes a single socket timeout; connect and greeting
            // limits from config are bounded by it.
            .timeout(Some(Duration::from_secs(config.socket_timeout_secs)))
            .build();

        Ok(Self { transport })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, AppError> {
    address
        .parse()
        .map_err(|_| AppError::InvalidRecipients(vec![address.to_string()]))
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn verify(&self) -> Result<(), AppError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppError::TransportVerifyFailed(
                "connection test returned negative".to_string(),
            )),
            Err(e) => Err(AppError::TransportVerifyFailed(e.to_string())),
        }
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<MailOutcome, AppError> {
        let message_id = format!("<{}@invoicing>", Uuid::new_v4());

        let mut builder = Message::builder()
            .from(parse_mailbox(&email.from)?)
            .subject(&email.subject)
            .message_id(Some(message_id.clone()));
        for to in &email.to {
            builder = builder.to(parse_mailbox(to)?);
        }
        for cc in &email.cc {
            builder = builder.cc(parse_mailbox(cc)?);
        }
        for bcc in &email.bcc {
            builder = builder.bcc(parse_mailbox(bcc)?);
        }

        let text_part = SinglePart::builder()
            .header(ContentType::TEXT_PLAIN)
            .body(email.body_text.clone());

        let message = match &email.attachment {
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                    AppError::InternalError(anyhow::anyhow!("attachment content type: {}", e))
                })?;
                builder.multipart(
                    MultiPart::mixed().singlepart(text_part).singlepart(
                        Attachment::new(attachment.filename.clone())
                            .body(attachment.bytes.clone(), content_type),
                    ),
                )
            }
            None => builder.singlepart(text_part),
        }
        .map_err(|e| AppError::DeliveryFailed(format!("failed to build message: {}", e)))?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| AppError::DeliveryFailed(e.to_string()))?;

        // SMTP accepts or rejects the whole envelope; a positive completion
        // means every recipient was accepted by the relay.
        let mut accepted = email.to.clone();
        accepted.extend(email.cc.iter().cloned());
        accepted.extend(email.bcc.iter().cloned());

        let raw = format!(
            "{} {}",
            response.code(),
            response.message().collect::<Vec<_>>().join(" ")
        );

        Ok(MailOutcome {
            message_id,
            accepted,
            rejected: Vec::new(),
            response: raw,
        })
    }
}

/// Stands in when SMTP is enabled but incompletely configured: every send
/// fails up front with the missing keys named.
pub struct UnconfiguredMailer {
    missing: Vec<String>,
}

impl UnconfiguredMailer {
    pub fn new(missing: Vec<String>) -> Self {
        Self { missing }
    }
}

#[async_trait]
impl MailTransport for UnconfiguredMailer {
    fn missing_config(&self) -> Option<Vec<String>> {
        Some(self.missing.clone())
    }

    async fn verify(&self) -> Result<(), AppError> {
        Err(AppError::EmailNotConfigured(self.missing.clone()))
    }

    async fn send(&self, _email: &OutgoingEmail) -> Result<MailOutcome, AppError> {
        Err(AppError::EmailNotConfigured(self.missing.clone()))
    }
}

/// In-process transport for tests and for running without SMTP configured.
pub struct MockMailer {
    verify_error: Option<String>,
    send_error: Option<String>,
    sent: tokio::sync::Mutex<Vec<OutgoingEmail>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self {
            verify_error: None,
            send_error: None,
            sent: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing_verify(message: &str) -> Self {
        Self {
            verify_error: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn failing_send(message: &str) -> Self {
        Self {
            send_error: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub async fn sent_messages(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().await.clone()
    }
}

impl Default for MockMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailTransport for MockMailer {
    async fn verify(&self) -> Result<(), AppError> {
        match &self.verify_error {
            Some(msg) => Err(AppError::TransportVerifyFailed(msg.clone())),
            None => Ok(()),
        }
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<MailOutcome, AppError> {
        if let Some(msg) = &self.send_error {
            return Err(AppError::DeliveryFailed(msg.clone()));
        }
        self.sent.lock().await.push(email.clone());

        let mut accepted = email.to.clone();
        accepted.extend(email.cc.iter().cloned());
        accepted.extend(email.bcc.iter().cloned());

        tracing::info!(to = ?email.to, subject = %email.subject, "[MOCK] Email would be sent");

        Ok(MailOutcome {
            message_id: format!("<{}@mock>", Uuid::new_v4()),
            accepted,
            rejected: Vec::new(),
            response: "250 OK mock".to_string(),
        })
    }
}
