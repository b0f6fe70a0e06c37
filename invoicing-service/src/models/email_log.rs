//! Append-only audit log of email send attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of a send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailLogStatus {
    Sent,
    Failed,
}

/// One row per send attempt that reached the transport, written whether the
/// attempt succeeded or failed. Rows are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLog {
    pub log_id: Uuid,
    pub user_id: Uuid,
    pub invoice_id: Uuid,
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body_text: String,
    pub currency: String,
    pub status: EmailLogStatus,
    pub provider_message_id: Option<String>,
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub provider_response: Option<String>,
    pub error_message: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// Envelope fields captured before the attempt, shared by the success and
/// failure rows.
#[derive(Debug, Clone)]
pub struct EmailLogDraft {
    pub user_id: Uuid,
    pub invoice_id: Uuid,
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body_text: String,
    pub currency: String,
}

impl EmailLogDraft {
    pub fn sent(
        self,
        provider_message_id: String,
        accepted: Vec<String>,
        rejected: Vec<String>,
        provider_response: String,
    ) -> EmailLog {
        EmailLog {
            log_id: Uuid::new_v4(),
            user_id: self.user_id,
            invoice_id: self.invoice_id,
            from: self.from,
            to: self.to,
            cc: self.cc,
            bcc: self.bcc,
            subject: self.subject,
            body_text: self.body_text,
            currency: self.currency,
            status: EmailLogStatus::Sent,
            provider_message_id: Some(provider_message_id),
            accepted,
            rejected,
            provider_response: Some(provider_response),
            error_message: None,
            sent_at: Utc::now(),
        }
    }

    pub fn failed(self, error_message: String) -> EmailLog {
        EmailLog {
            log_id: Uuid::new_v4(),
            user_id: self.user_id,
            invoice_id: self.invoice_id,
            from: self.from,
            to: self.to,
            cc: self.cc,
            bcc: self.bcc,
            subject: self.subject,
            body_text: self.body_text,
            currency: self.currency,
            status: EmailLogStatus::Failed,
            provider_message_id: None,
            accepted: Vec::new(),
            rejected: Vec::new(),
            provider_response: None,
            error_message: Some(error_message),
            sent_at: Utc::now(),
        }
    }
}
