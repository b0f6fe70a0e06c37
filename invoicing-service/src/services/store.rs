//! Storage seams.
//!
//! The persistence engine is an external collaborator: this service only
//! needs create/find/update by opaque id, so it talks to traits. The bundled
//! implementations keep everything in process memory, which is also what the
//! integration tests run against.

use crate::models::{CatalogItem, Client, EmailLog, Invoice, Issuer};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use service_core::error::AppError;
use uuid::Uuid;

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn insert(&self, invoice: Invoice) -> Result<Invoice, AppError>;
    async fn find(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError>;
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Invoice>, AppError>;
    /// Replaces the stored record and bumps `updated_utc`.
    async fn update(&self, invoice: Invoice) -> Result<Invoice, AppError>;
}

/// Append-only store. There is intentionally no update or delete.
#[async_trait]
pub trait EmailLogStore: Send + Sync {
    async fn append(&self, log: EmailLog) -> Result<(), AppError>;
    async fn list_for_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        limit: usize,
    ) -> Result<Vec<EmailLog>, AppError>;
    async fn list_for_user(&self, user_id: Uuid, limit: usize) -> Result<Vec<EmailLog>, AppError>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn find(&self, client_id: Uuid) -> Result<Option<Client>, AppError>;
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn find(&self, item_id: Uuid) -> Result<Option<CatalogItem>, AppError>;
}

#[async_trait]
pub trait IssuerStore: Send + Sync {
    async fn find(&self, user_id: Uuid) -> Result<Option<Issuer>, AppError>;
}

#[derive(Default)]
pub struct InMemoryInvoiceStore {
    invoices: DashMap<Uuid, Invoice>,
}

impl InMemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoiceStore for InMemoryInvoiceStore {
    async fn insert(&self, invoice: Invoice) -> Result<Invoice, AppError> {
        self.invoices.insert(invoice.invoice_id, invoice.clone());
        Ok(invoice)
    }

    async fn find(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        Ok(self.invoices.get(&invoice_id).map(|r| r.clone()))
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Invoice>, AppError> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| r.clone())
            .collect();
        invoices.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(invoices)
    }

    async fn update(&self, mut invoice: Invoice) -> Result<Invoice, AppError> {
        invoice.updated_utc = Utc::now();
        self.invoices.insert(invoice.invoice_id, invoice.clone());
        Ok(invoice)
    }
}

#[derive(Default)]
pub struct InMemoryEmailLogStore {
    logs: tokio::sync::Mutex<Vec<EmailLog>>,
}

impl InMemoryEmailLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EmailLogStore for InMemoryEmailLogStore {
    async fn append(&self, log: EmailLog) -> Result<(), AppError> {
        self.logs.lock().await.push(log);
        Ok(())
    }

    async fn list_for_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        limit: usize,
    ) -> Result<Vec<EmailLog>, AppError> {
        let logs = self.logs.lock().await;
        let mut matched: Vec<EmailLog> = logs
            .iter()
            .filter(|l| l.user_id == user_id && l.invoice_id == invoice_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        matched.truncate(limit);
        Ok(matched)
    }

    async fn list_for_user(&self, user_id: Uuid, limit: usize) -> Result<Vec<EmailLog>, AppError> {
        let logs = self.logs.lock().await;
        let mut matched: Vec<EmailLog> = logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        matched.truncate(limit);
        Ok(matched)
    }
}

#[derive(Default)]
pub struct InMemoryClientStore {
    clients: DashMap<Uuid, Client>,
}

impl InMemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, client: Client) {
        self.clients.insert(client.client_id, client);
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn find(&self, client_id: Uuid) -> Result<Option<Client>, AppError> {
        Ok(self.clients.get(&client_id).map(|r| r.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryItemStore {
    items: DashMap<Uuid, CatalogItem>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, item: CatalogItem) {
        self.items.insert(item.item_id, item);
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn find(&self, item_id: Uuid) -> Result<Option<CatalogItem>, AppError> {
        Ok(self.items.get(&item_id).map(|r| r.clone()))
    }
}

/// Serves one issuer profile, from configuration, to every user. Used when
/// the service runs standalone without a profile backend.
pub struct ConfigIssuerStore {
    template: Issuer,
}

impl ConfigIssuerStore {
    pub fn new(template: Issuer) -> Self {
        Self { template }
    }
}

#[async_trait]
impl IssuerStore for ConfigIssuerStore {
    async fn find(&self, user_id: Uuid) -> Result<Option<Issuer>, AppError> {
        let mut issuer = self.template.clone();
        issuer.user_id = user_id;
        Ok(Some(issuer))
    }
}

#[derive(Default)]
pub struct InMemoryIssuerStore {
    issuers: DashMap<Uuid, Issuer>,
}

impl InMemoryIssuerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, issuer: Issuer) {
        self.issuers.insert(issuer.user_id, issuer);
    }
}

#[async_trait]
impl IssuerStore for InMemoryIssuerStore {
    async fn find(&self, user_id: Uuid) -> Result<Option<Issuer>, AppError> {
        Ok(self.issuers.get(&user_id).map(|r| r.clone()))
    }
}
