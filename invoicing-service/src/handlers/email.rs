use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::handlers::{
    CurrencyQuery,
    invoices::{load_owned_invoice, require_confirmation, require_transition},
    resolve_currency,
};
use crate::models::{Client, EmailLog, Invoice, InvoiceStatus, Issuer, StatusAction};
use crate::services::dispatch::MailFields;
use crate::services::mailer::{EmailDraft, default_draft, reminder_draft};
use crate::services::pdf::render_invoice_pdf;
use crate::startup::AppState;
use service_core::auth::AuthUser;
use service_core::error::AppError;

const INVOICE_HISTORY_CAP: usize = 50;
const USER_HISTORY_CAP: usize = 200;

/// Accept `"a@x.io, b@x.io"` as well as `["a@x.io", "b@x.io"]`.
fn string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Value {
        One(String),
        Many(Vec<String>),
    }

    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::One(s)) => Ok(vec![s]),
        Some(Value::Many(v)) => Ok(v),
        None => Ok(Vec::new()),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    #[serde(default, deserialize_with = "string_or_vec")]
    pub to: Vec<String>,
    #[serde(default, deserialize_with = "string_or_vec")]
    pub cc: Vec<String>,
    #[serde(default, deserialize_with = "string_or_vec")]
    pub bcc: Vec<String>,
    pub subject: Option<String>,
    pub body_text: Option<String>,
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailResponse {
    pub message: String,
    pub message_id: String,
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub response: String,
}

async fn load_send_context(
    state: &AppState,
    invoice_id: Uuid,
    user: &AuthUser,
) -> Result<(Invoice, Client, Issuer), AppError> {
    let invoice = load_owned_invoice(state, invoice_id, user).await?;
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
    Ok((invoice, client, issuer))
}

fn merge_with_draft(request: SendEmailRequest, draft: EmailDraft) -> MailFields {
    MailFields {
        to: if request.to.is_empty() { draft.to } else { request.to },
        cc: if request.cc.is_empty() { draft.cc } else { request.cc },
        bcc: if request.bcc.is_empty() { draft.bcc } else { request.bcc },
        subject: request
            .subject
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(draft.subject),
        body_text: request
            .body_text
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(draft.body_text),
    }
}

/// Send the invoice to the client, with the rendered PDF attached.
///
/// The `draft -> sent` transition is committed only after the send attempt
/// resolves successfully; a failed attempt leaves the invoice in draft while
/// the failed EmailLog row preserves the audit trail.
#[tracing::instrument(skip(state, request), fields(user_id = %user.user_id))]
pub async fn send_invoice_email(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Query(query): Query<CurrencyQuery>,
    user: AuthUser,
    Json(request): Json<SendEmailRequest>,
) -> Result<Json<SendEmailResponse>, AppError> {
    let (invoice, client, issuer) = load_send_context(&state, invoice_id, &user).await?;

    require_confirmation(request.confirm)?;
    require_transition(&invoice, StatusAction::Send)?;

    let (currency, rate) = resolve_currency(&state, &query).await?;
    let draft = default_draft(&invoice, &client, &issuer, state.dispatcher.from_address());
    let mail = merge_with_draft(request, draft);

    let outcome = state
        .dispatcher
        .send_and_log(&invoice, mail, &currency, || {
            render_invoice_pdf(&invoice, &client, &issuer, &currency, rate)
        })
        .await?;

    let mut updated = invoice;
    updated.status = InvoiceStatus::Sent;
    state.invoices.update(updated).await?;

    Ok(Json(SendEmailResponse {
        message: "Email sent successfully".to_string(),
        message_id: outcome.message_id,
        accepted: outcome.accepted,
        rejected: outcome.rejected,
        response: outcome.response,
    }))
}

/// Send a payment reminder for an already-sent invoice. Status is unchanged.
#[tracing::instrument(skip(state, request), fields(user_id = %user.user_id))]
pub async fn remind_invoice_email(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Query(query): Query<CurrencyQuery>,
    user: AuthUser,
    Json(request): Json<SendEmailRequest>,
) -> Result<Json<SendEmailResponse>, AppError> {
    let (invoice, client, issuer) = load_send_context(&state, invoice_id, &user).await?;

    require_confirmation(request.confirm)?;
    require_transition(&invoice, StatusAction::Remind)?;

    let (currency, rate) = resolve_currency(&state, &query).await?;
    let draft = reminder_draft(&invoice, &client, &issuer, state.dispatcher.from_address());
    let mail = merge_with_draft(request, draft);

    let outcome = state
        .dispatcher
        .send_and_log(&invoice, mail, &currency, || {
            render_invoice_pdf(&invoice, &client, &issuer, &currency, rate)
        })
        .await?;

    Ok(Json(SendEmailResponse {
        message: "Reminder sent successfully".to_string(),
        message_id: outcome.message_id,
        accepted: outcome.accepted,
        rejected: outcome.rejected,
        response: outcome.response,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDraftResponse {
    pub invoice_id: Uuid,
    pub currency: String,
    pub draft: EmailDraft,
}

/// Default draft for pre-filling a compose form.
#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn get_email_draft(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Query(query): Query<CurrencyQuery>,
    user: AuthUser,
) -> Result<Json<EmailDraftResponse>, AppError> {
    let (invoice, client, issuer) = load_send_context(&state, invoice_id, &user).await?;
    let (currency, _) = resolve_currency(&state, &query).await?;
    let draft = default_draft(&invoice, &client, &issuer, state.dispatcher.from_address());

    Ok(Json(EmailDraftResponse {
        invoice_id: invoice.invoice_id,
        currency,
        draft,
    }))
}

/// Send history for one invoice, most recent first.
#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn invoice_email_history(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Json<Vec<EmailLog>>, AppError> {
    let invoice = load_owned_invoice(&state, invoice_id, &user).await?;
    let logs = state
        .email_logs
        .list_for_invoice(user.user_id, invoice.invoice_id, INVOICE_HISTORY_CAP)
        .await?;
    Ok(Json(logs))
}

/// Send history across all of the user's invoices, most recent first.
#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn email_history(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<EmailLog>>, AppError> {
    let logs = state
        .email_logs
        .list_for_user(user.user_id, USER_HISTORY_CAP)
        .await?;
    Ok(Json(logs))
}
