//! Business services for invoicing-service.

pub mod dispatch;
pub mod fx;
pub mod mailer;
pub mod pdf;
pub mod store;
pub mod totals;
