//! Read-only collaborator shapes.
//!
//! Clients, catalog items, and issuer profiles are owned by external CRUD
//! stores; this service only looks them up by id.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Billing recipient of an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub client_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Catalog item. Referenced at invoice creation only: it expands into an
/// inline line item, so later catalog edits never rewrite invoice history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub item_id: Uuid,
    pub description: String,
    pub price: Decimal,
    pub quantity: Decimal,
}

/// The invoicing user as they appear on outbound documents and email.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issuer {
    pub user_id: Uuid,
    pub name: String,
    pub company_name: Option<String>,
    pub email: String,
    /// PNG bytes; documents render without a logo when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_png: Option<Vec<u8>>,
}

impl Issuer {
    /// Name shown on documents and in email subjects.
    pub fn display_name(&self) -> &str {
        self.company_name.as_deref().unwrap_or(&self.name)
    }
}
