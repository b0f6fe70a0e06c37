//! HTTP handlers for invoicing-service.

pub mod email;
pub mod health;
pub mod invoices;
pub mod pdf;

use crate::startup::AppState;
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;

/// `?currency=` query accepted by the PDF and email endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct CurrencyQuery {
    pub currency: Option<String>,
}

/// Resolve the display currency and its base-relative rate. Defaults to the
/// base currency, which short-circuits to a rate of exactly 1.
pub(crate) async fn resolve_currency(
    state: &AppState,
    query: &CurrencyQuery,
) -> Result<(String, Decimal), AppError> {
    let requested = query.currency.as_deref().unwrap_or(crate::services::fx::BASE_CURRENCY);
    let code = crate::services::fx::normalize_currency_code(requested)?;
    let rate = state.fx.get_rate(&code).await?;
    Ok((code, rate))
}
