use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{DisplayStatus, Invoice, InvoiceStatus, LineItem, StatusAction};
use crate::services::totals::{Totals, compute_totals};
use crate::startup::AppState;
use service_core::auth::AuthUser;
use service_core::error::AppError;

/// Load an invoice and enforce ownership. Every operation in this service is
/// scoped to the acting user; a mismatch is a 401 with zero side effects.
pub(crate) async fn load_owned_invoice(
    state: &AppState,
    invoice_id: Uuid,
    user: &AuthUser,
) -> Result<Invoice, AppError> {
    let invoice = state
        .invoices
        .find(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    if invoice.owner_id != user.user_id {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "User not authorized"
        )));
    }

    Ok(invoice)
}

pub(crate) fn require_confirmation(confirm: bool) -> Result<(), AppError> {
    if confirm {
        Ok(())
    } else {
        Err(AppError::BadRequest(anyhow::anyhow!(
            "Explicit confirmation is required for this action"
        )))
    }
}

pub(crate) fn require_transition(
    invoice: &Invoice,
    action: StatusAction,
) -> Result<(), AppError> {
    if invoice.status.allows(action) {
        Ok(())
    } else {
        Err(AppError::BadRequest(anyhow::anyhow!(
            "Action '{}' is not allowed from status '{}'",
            action.as_str(),
            invoice.status.as_str()
        )))
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    #[validate(length(min = 1, message = "invoiceNumber is required"))]
    pub invoice_number: String,
    pub client_id: Uuid,
    #[serde(default)]
    pub items: Vec<LineItem>,
    /// Catalog references expand into inline lines at creation time.
    #[serde(default)]
    pub catalog_item_ids: Vec<Uuid>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub extra_charges: Decimal,
    pub notes: Option<String>,
    pub payment_instructions: Option<String>,
    pub internal_memo: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub totals: Totals,
    pub display_status: DisplayStatus,
}

fn into_response(invoice: Invoice) -> InvoiceResponse {
    let totals = compute_totals(&invoice.items, invoice.discount, invoice.extra_charges);
    let display_status = invoice.display_status(Utc::now().date_naive());
    InvoiceResponse {
        invoice,
        totals,
        display_status,
    }
}

// Cross-field rules the derive can't express.
fn validate_new_invoice(request: &CreateInvoiceRequest) -> Result<(), AppError> {
    if request.invoice_number.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "invoiceNumber is required"
        )));
    }
    if request.due_date < request.issue_date {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "dueDate must be on or after issueDate"
        )));
    }
    if request.discount < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "discount must be 0 or greater"
        )));
    }
    if request.extra_charges < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "extraCharges must be 0 or greater"
        )));
    }
    let hundred = Decimal::from(100);
    for (idx, item) in request.items.iter().enumerate() {
        if item.quantity < Decimal::ZERO || item.rate < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "items[{}]: quantity and rate must be 0 or greater",
                idx
            )));
        }
        if item.tax_percent < Decimal::ZERO || item.tax_percent > hundred {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "items[{}]: taxPercent must be between 0 and 100",
                idx
            )));
        }
    }
    Ok(())
}

#[tracing::instrument(skip(state, request), fields(user_id = %user.user_id))]
pub async fn create_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    request.validate()?;
    validate_new_invoice(&request)?;

    let client = state
        .clients
        .find(request.client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    // Catalog references become inline lines now; later catalog edits must
    // not rewrite this invoice.
    let mut items = request.items;
    for item_id in &request.catalog_item_ids {
        let catalog_item = state
            .items
            .find(*item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Item not found")))?;
        items.push(LineItem {
            description: catalog_item.description,
            quantity: catalog_item.quantity,
            rate: catalog_item.price,
            tax_percent: Decimal::ZERO,
        });
    }

    let now = Utc::now();
    let invoice = state
        .invoices
        .insert(Invoice {
            invoice_id: Uuid::new_v4(),
            owner_id: user.user_id,
            invoice_number: request.invoice_number.trim().to_string(),
            client_id: client.client_id,
            items,
            issue_date: request.issue_date,
            due_date: request.due_date,
            currency: crate::services::fx::BASE_CURRENCY.to_string(),
            discount: request.discount,
            extra_charges: request.extra_charges,
            status: InvoiceStatus::Draft,
            notes: request.notes,
            payment_instructions: request.payment_instructions,
            internal_memo: request.internal_memo,
            paid_amount: None,
            paid_date: None,
            created_utc: now,
            updated_utc: now,
        })
        .await?;

    tracing::info!(invoice_id = %invoice.invoice_id, "Invoice created");

    Ok((StatusCode::CREATED, Json(into_response(invoice))))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    let invoices = state.invoices.list_for_owner(user.user_id).await?;
    Ok(Json(invoices.into_iter().map(into_response).collect()))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = load_owned_invoice(&state, invoice_id, &user).await?;
    Ok(Json(into_response(invoice)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPaidRequest {
    pub paid_amount: Decimal,
    pub paid_date: NaiveDate,
    #[serde(default)]
    pub confirm: bool,
}

/// Record a payment and move the invoice to its terminal status.
///
/// `paidAmount` only has to be non-negative; partial and over payment are
/// accepted without further rules.
#[tracing::instrument(skip(state, request), fields(user_id = %user.user_id))]
pub async fn mark_paid(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    user: AuthUser,
    Json(request): Json<MarkPaidRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let mut invoice = load_owned_invoice(&state, invoice_id, &user).await?;

    require_confirmation(request.confirm)?;
    require_transition(&invoice, StatusAction::MarkPaid)?;

    if request.paid_amount < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "paidAmount must be 0 or greater"
        )));
    }

    invoice.status = InvoiceStatus::Paid;
    invoice.paid_amount = Some(request.paid_amount);
    invoice.paid_date = Some(request.paid_date);
    let invoice = state.invoices.update(invoice).await?;

    tracing::info!(invoice_id = %invoice.invoice_id, "Invoice marked paid");

    Ok(Json(into_response(invoice)))
}
