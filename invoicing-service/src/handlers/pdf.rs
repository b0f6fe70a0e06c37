use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::handlers::{CurrencyQuery, invoices::load_owned_invoice, resolve_currency};
use crate::services::pdf::render_invoice_pdf;
use crate::startup::AppState;
use service_core::auth::AuthUser;
use service_core::error::AppError;

/// Stream the rendered invoice as a PDF download.
#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn download_invoice_pdf(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Query(query): Query<CurrencyQuery>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let invoice = load_owned_invoice(&state, invoice_id, &user).await?;

    let client = state
        .clients
        .find(invoice.client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;
    let issuer = state
        .issuers
        .find(invoice.owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Issuer profile not found")))?;

    let (currency, rate) = resolve_currency(&state, &query).await?;
    let bytes = render_invoice_pdf(&invoice, &client, &issuer, &currency, rate)?;

    let disposition = format!(
        "attachment; filename=invoice-{}.pdf",
        invoice.invoice_number
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
