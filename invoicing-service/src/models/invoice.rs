//! Invoice model and status transitions.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Stored invoice status.
///
/// `overdue` is deliberately not a stored variant: it is derived from the due
/// date at display time (see [`InvoiceStatus::display`]), so no background job
/// is needed to keep it accurate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Unpaid,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => InvoiceStatus::Sent,
            "unpaid" => InvoiceStatus::Unpaid,
            "paid" => InvoiceStatus::Paid,
            _ => InvoiceStatus::Draft,
        }
    }

    /// Display label including the derived `overdue` state.
    pub fn display(self, due_date: NaiveDate, today: NaiveDate) -> DisplayStatus {
        match self {
            InvoiceStatus::Draft => DisplayStatus::Draft,
            InvoiceStatus::Paid => DisplayStatus::Paid,
            InvoiceStatus::Sent | InvoiceStatus::Unpaid if due_date < today => {
                DisplayStatus::Overdue
            }
            InvoiceStatus::Sent => DisplayStatus::Sent,
            InvoiceStatus::Unpaid => DisplayStatus::Unpaid,
        }
    }

    /// Whether `action` is legal from this status.
    pub fn allows(self, action: StatusAction) -> bool {
        match action {
            StatusAction::Send => self == InvoiceStatus::Draft,
            StatusAction::Remind | StatusAction::MarkPaid => {
                matches!(self, InvoiceStatus::Sent | InvoiceStatus::Unpaid)
            }
        }
    }
}

/// Display-only status label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Draft,
    Sent,
    Unpaid,
    Overdue,
    Paid,
}

/// User-triggered status transitions. Each one requires explicit confirmation
/// at the API boundary before any side effect runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    Send,
    Remind,
    MarkPaid,
}

impl StatusAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusAction::Send => "send",
            StatusAction::Remind => "remind",
            StatusAction::MarkPaid => "mark_paid",
        }
    }
}

/// One billable entry on an invoice.
///
/// Numeric fields deserialize leniently: missing, null, or malformed values
/// coerce to zero instead of failing the whole payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub quantity: Decimal,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub rate: Decimal,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub tax_percent: Decimal,
}

fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(coerce_decimal(&value))
}

/// Defensive numeric parsing: anything that is not a usable number is zero.
pub fn coerce_decimal(value: &serde_json::Value) -> Decimal {
    match value {
        serde_json::Value::Number(n) => {
            let s = n.to_string();
            s.parse()
                .or_else(|_| Decimal::from_scientific(&s))
                .unwrap_or(Decimal::ZERO)
        }
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

/// Invoice record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub owner_id: Uuid,
    pub invoice_number: String,
    pub client_id: Uuid,
    pub items: Vec<LineItem>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    /// Authoring currency. Amounts are stored in this currency; display
    /// conversion never mutates them.
    pub currency: String,
    pub discount: Decimal,
    pub extra_charges: Decimal,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    pub payment_instructions: Option<String>,
    /// Never included in rendered or emailed output.
    pub internal_memo: Option<String>,
    pub paid_amount: Option<Decimal>,
    pub paid_date: Option<NaiveDate>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Invoice {
    pub fn display_status(&self, today: NaiveDate) -> DisplayStatus {
        self.status.display(self.due_date, today)
    }
}
