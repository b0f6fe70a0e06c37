//! Application wiring and lifecycle.

use crate::config::InvoicingConfig;
use crate::handlers;
use crate::models::Issuer;
use crate::services::dispatch::EmailDispatcher;
use crate::services::fx::{FxCache, HttpRateSource, RateSource, StaticRateSource};
use crate::services::mailer::{MailTransport, MockMailer, SmtpMailer, UnconfiguredMailer};
use crate::services::store::{
    ClientStore, ConfigIssuerStore, EmailLogStore, InMemoryClientStore, InMemoryEmailLogStore,
    InMemoryInvoiceStore, InMemoryItemStore, InvoiceStore, IssuerStore, ItemStore,
};
use axum::{
    Router,
    extract::FromRef,
    routing::{get, post},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use service_core::auth::AuthVerifier;
use service_core::error::AppError;
use std::collections::HashMap;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: InvoicingConfig,
    pub invoices: Arc<dyn InvoiceStore>,
    pub email_logs: Arc<dyn EmailLogStore>,
    pub clients: Arc<dyn ClientStore>,
    pub items: Arc<dyn ItemStore>,
    pub issuers: Arc<dyn IssuerStore>,
    pub dispatcher: Arc<EmailDispatcher>,
    pub fx: Arc<FxCache>,
    pub auth: AuthVerifier,
}

impl FromRef<AppState> for AuthVerifier {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Fixed rate table used when the live rate source is disabled.
fn offline_rates() -> HashMap<String, Decimal> {
    HashMap::from([
        ("USD".to_string(), dec!(0.012)),
        ("EUR".to_string(), dec!(0.011)),
        ("GBP".to_string(), dec!(0.0095)),
        ("AED".to_string(), dec!(0.044)),
        ("AUD".to_string(), dec!(0.018)),
        ("CAD".to_string(), dec!(0.016)),
        ("SGD".to_string(), dec!(0.016)),
        ("JPY".to_string(), dec!(1.8)),
    ])
}

impl AppState {
    /// Wire up production collaborators from configuration. Disabled or
    /// misconfigured externals fall back to in-process stand-ins so the
    /// service always comes up.
    pub fn from_config(config: InvoicingConfig) -> Result<Self, AppError> {
        let mailer: Arc<dyn MailTransport> = if config.smtp.enabled {
            match SmtpMailer::new(&config.smtp) {
                Ok(mailer) => {
                    tracing::info!(host = %config.smtp.host, "SMTP transport initialized");
                    Arc::new(mailer)
                }
                Err(AppError::EmailNotConfigured(missing)) => {
                    tracing::warn!(
                        missing = ?missing,
                        "SMTP enabled but incompletely configured; sends will be refused"
                    );
                    Arc::new(UnconfiguredMailer::new(missing))
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize SMTP transport: {}. Using mock.", e);
                    Arc::new(MockMailer::new())
                }
            }
        } else {
            tracing::info!("SMTP disabled, using mock transport");
            Arc::new(MockMailer::new())
        };

        let rate_source: Arc<dyn RateSource> = if config.fx.enabled {
            tracing::info!(url = %config.fx.rates_url, "Live exchange rate source enabled");
            Arc::new(HttpRateSource::new(
                config.fx.rates_url.clone(),
                Duration::from_secs(config.fx.request_timeout_secs),
            )?)
        } else {
            tracing::info!("Live exchange rates disabled, using offline table");
            Arc::new(StaticRateSource::new(offline_rates()))
        };
        let fx = Arc::new(FxCache::new(
            rate_source,
            Duration::from_secs(config.fx.ttl_secs),
        ));

        let logo_png = match &config.issuer.logo_path {
            Some(path) => match std::fs::read(path) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!(path = %path, "Failed to read issuer logo: {}", e);
                    None
                }
            },
            None => None,
        };
        let issuer_template = Issuer {
            user_id: Uuid::nil(),
            name: config.issuer.name.clone(),
            company_name: config.issuer.company_name.clone(),
            email: config.issuer.email.clone(),
            logo_png,
        };

        let email_logs: Arc<dyn EmailLogStore> = Arc::new(InMemoryEmailLogStore::new());
        let from = if config.smtp.from_email.trim().is_empty() {
            config.issuer.email.clone()
        } else {
            config.smtp.from_email.clone()
        };
        let dispatcher = Arc::new(EmailDispatcher::new(mailer, email_logs.clone(), from));

        let auth = AuthVerifier::new(&config.auth.jwt_secret);

        Ok(Self {
            config,
            invoices: Arc::new(InMemoryInvoiceStore::new()),
            email_logs,
            clients: Arc::new(InMemoryClientStore::new()),
            items: Arc::new(InMemoryItemStore::new()),
            issuers: Arc::new(ConfigIssuerStore::new(issuer_template)),
            dispatcher,
            fx,
            auth,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route(
            "/invoices",
            post(handlers::invoices::create_invoice).get(handlers::invoices::list_invoices),
        )
        .route("/invoices/:id", get(handlers::invoices::get_invoice))
        .route("/invoices/:id/mark-paid", post(handlers::invoices::mark_paid))
        .route("/invoices/:id/pdf", get(handlers::pdf::download_invoice_pdf))
        .route(
            "/invoices/:id/email/send",
            post(handlers::email::send_invoice_email),
        )
        .route(
            "/invoices/:id/email/remind",
            post(handlers::email::remind_invoice_email),
        )
        .route(
            "/invoices/:id/email/draft",
            get(handlers::email::get_email_draft),
        )
        .route(
            "/invoices/:id/email/history",
            get(handlers::email::invoice_email_history),
        )
        .route("/email/history", get(handlers::email::email_history))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: InvoicingConfig) -> Result<Self, AppError> {
        let state = AppState::from_config(config)?;
        Self::with_state(state).await
    }

    /// Bind and serve a fully-constructed state. Tests use this to inject
    /// mock collaborators.
    pub async fn with_state(state: AppState) -> Result<Self, AppError> {
        let app = router(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], state.config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
