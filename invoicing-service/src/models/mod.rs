//! Data models for invoicing-service.

mod client;
mod email_log;
mod invoice;

pub use client::{CatalogItem, Client, Issuer};
pub use email_log::{EmailLog, EmailLogDraft, EmailLogStatus};
pub use invoice::{
    DisplayStatus, Invoice, InvoiceStatus, LineItem, StatusAction, coerce_decimal,
};
