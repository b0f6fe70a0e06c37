//! Audited email dispatch.
//!
//! One place owns the send pipeline ordering: recipient/content validation,
//! PDF rendering, transport verify, delivery, audit log. Validation failures
//! happen before anything was attempted, so they write no log row; once the
//! transport is engaged, every outcome is logged.

use crate::models::{EmailLogDraft, Invoice};
use crate::services::mailer::{
    EmailAttachment, MailOutcome, MailTransport, OutgoingEmail, normalize_email_list,
    validate_recipients,
};
use crate::services::store::EmailLogStore;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{error, info};

/// Recipient and content fields for one send, before normalization.
#[derive(Debug, Clone)]
pub struct MailFields {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body_text: String,
}

pub struct EmailDispatcher {
    mailer: Arc<dyn MailTransport>,
    logs: Arc<dyn EmailLogStore>,
    from: String,
}

impl EmailDispatcher {
    pub fn new(mailer: Arc<dyn MailTransport>, logs: Arc<dyn EmailLogStore>, from: String) -> Self {
        Self { mailer, logs, from }
    }

    pub fn from_address(&self) -> &str {
        &self.from
    }

    /// Run the full pipeline for one invoice email.
    ///
    /// `render_pdf` is invoked only after recipients and content pass
    /// validation; if it fails there is nothing to audit and no log row is
    /// written. From the first transport interaction onward exactly one
    /// EmailLog row records the attempt, matching the actual outcome.
    pub async fn send_and_log<F>(
        &self,
        invoice: &Invoice,
        mail: MailFields,
        currency: &str,
        render_pdf: F,
    ) -> Result<MailOutcome, AppError>
    where
        F: FnOnce() -> Result<Vec<u8>, AppError>,
    {
        if let Some(missing) = self.mailer.missing_config() {
            return Err(AppError::EmailNotConfigured(missing));
        }

        let to = normalize_email_list(&mail.to);
        let cc = normalize_email_list(&mail.cc);
        let bcc = normalize_email_list(&mail.bcc);
        validate_recipients(&to, &cc, &bcc)?;

        let subject = mail.subject.trim().to_string();
        if subject.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!("Subject is required")));
        }
        let body_text = mail.body_text.trim().to_string();
        if body_text.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Email content is required"
            )));
        }

        let pdf = render_pdf()?;

        let log_draft = EmailLogDraft {
            user_id: invoice.owner_id,
            invoice_id: invoice.invoice_id,
            from: self.from.clone(),
            to: to.clone(),
            cc: cc.clone(),
            bcc: bcc.clone(),
            subject: subject.clone(),
            body_text: body_text.clone(),
            currency: currency.to_string(),
        };

        let email = OutgoingEmail {
            from: self.from.clone(),
            to,
            cc,
            bcc,
            subject,
            body_text,
            attachment: Some(EmailAttachment {
                filename: format!("invoice-{}.pdf", invoice.invoice_number),
                content_type: "application/pdf".to_string(),
                bytes: pdf,
            }),
        };

        let attempt = async {
            self.mailer.verify().await?;
            self.mailer.send(&email).await
        }
        .await;

        match attempt {
            Ok(outcome) => {
                self.logs
                    .append(log_draft.sent(
                        outcome.message_id.clone(),
                        outcome.accepted.clone(),
                        outcome.rejected.clone(),
                        outcome.response.clone(),
                    ))
                    .await?;
                info!(
                    invoice_id = %invoice.invoice_id,
                    message_id = %outcome.message_id,
                    "Invoice email sent"
                );
                Ok(outcome)
            }
            Err(err) => {
                // The audit trail must exist for every attempted send.
                self.logs.append(log_draft.failed(err.to_string())).await?;
                error!(invoice_id = %invoice.invoice_id, error = %err, "Invoice email failed");
                Err(err)
            }
        }
    }
}
