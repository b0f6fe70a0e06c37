use invoicing_service::config::{
    AuthConfig, FxConfig, InvoicingConfig, IssuerConfig, SmtpConfig,
};
use invoicing_service::models::{Client, Issuer};
use invoicing_service::services::dispatch::EmailDispatcher;
use invoicing_service::services::fx::{FxCache, StaticRateSource};
use invoicing_service::services::mailer::MockMailer;
use invoicing_service::services::store::{
    ConfigIssuerStore, InMemoryClientStore, InMemoryEmailLogStore, InMemoryInvoiceStore,
    InMemoryItemStore,
};
use invoicing_service::startup::{AppState, Application};
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use service_core::auth::AuthVerifier;
use service_core::config::Config as CoreConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const TEST_FROM: &str = "billing@studio.test";

fn test_config() -> InvoicingConfig {
    InvoicingConfig {
        common: CoreConfig {
            port: 0,
            log_level: "info".to_string(),
        },
        smtp: SmtpConfig {
            host: String::new(),
            port: 587,
            user: String::new(),
            password: String::new(),
            from_email: TEST_FROM.to_string(),
            from_name: "Asha Studio".to_string(),
            enabled: false,
            connect_timeout_secs: 20,
            greeting_timeout_secs: 20,
            socket_timeout_secs: 30,
        },
        fx: FxConfig {
            rates_url: String::new(),
            ttl_secs: 3600,
            request_timeout_secs: 10,
            enabled: false,
        },
        auth: AuthConfig {
            jwt_secret: "test-secret".to_string(),
        },
        issuer: IssuerConfig {
            name: "Asha".to_string(),
            company_name: Some("Asha Studio".to_string()),
            email: "asha@studio.test".to_string(),
            logo_path: None,
        },
    }
}

pub struct TestApp {
    pub address: String,
    pub api: reqwest::Client,
    pub user_id: Uuid,
    pub token: String,
    pub auth: AuthVerifier,
    pub mailer: Arc<MockMailer>,
    pub clients: Arc<InMemoryClientStore>,
    pub items: Arc<InMemoryItemStore>,
    pub email_logs: Arc<InMemoryEmailLogStore>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_mailer(MockMailer::new()).await
    }

    /// Spin up the service with an injected transport so tests can force
    /// verify and delivery failures.
    pub async fn spawn_with_mailer(mailer: MockMailer) -> Self {
        let config = test_config();
        let auth = AuthVerifier::new(&config.auth.jwt_secret);

        let mailer = Arc::new(mailer);
        let email_logs = Arc::new(InMemoryEmailLogStore::new());
        let clients = Arc::new(InMemoryClientStore::new());
        let items = Arc::new(InMemoryItemStore::new());

        let rates = HashMap::from([
            ("USD".to_string(), dec!(0.012)),
            ("EUR".to_string(), dec!(0.011)),
        ]);
        let fx = Arc::new(FxCache::new(
            Arc::new(StaticRateSource::new(rates)),
            Duration::from_secs(3600),
        ));

        let issuer = Issuer {
            user_id: Uuid::nil(),
            name: config.issuer.name.clone(),
            company_name: config.issuer.company_name.clone(),
            email: config.issuer.email.clone(),
            logo_png: None,
        };

        let state = AppState {
            config,
            invoices: Arc::new(InMemoryInvoiceStore::new()),
            email_logs: email_logs.clone(),
            clients: clients.clone(),
            items: items.clone(),
            issuers: Arc::new(ConfigIssuerStore::new(issuer)),
            dispatcher: Arc::new(EmailDispatcher::new(
                mailer.clone(),
                email_logs.clone(),
                TEST_FROM.to_string(),
            )),
            fx,
            auth: auth.clone(),
        };

        let app = Application::with_state(state)
            .await
            .expect("Failed to build test application");
        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(app.run_until_stopped());

        let api = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if api.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let user_id = Uuid::new_v4();
        let token = auth.issue(user_id).expect("Failed to issue test token");

        TestApp {
            address,
            api,
            user_id,
            token,
            auth,
            mailer,
            clients,
            items,
            email_logs,
        }
    }

    /// Token for a second, unrelated user.
    pub fn token_for_other_user(&self) -> String {
        self.auth
            .issue(Uuid::new_v4())
            .expect("Failed to issue test token")
    }

    pub fn seed_client(&self) -> Uuid {
        let client_id = Uuid::new_v4();
        self.clients.seed(Client {
            client_id,
            name: "Acme Co".to_string(),
            email: Some("acme@example.com".to_string()),
            address: Some("42 Industrial Way".to_string()),
            phone: None,
        });
        client_id
    }

    pub fn invoice_body(&self, client_id: Uuid) -> Value {
        json!({
            "invoiceNumber": "INV-100",
            "clientId": client_id,
            "items": [
                { "description": "Design work", "quantity": 10, "rate": 100, "taxPercent": 18 }
            ],
            "issueDate": "2026-08-01",
            "dueDate": "2026-08-31",
            "discount": 0,
            "extraCharges": 0
        })
    }

    /// POST /invoices with a simple one-line body; returns the created JSON.
    pub async fn create_invoice(&self, client_id: Uuid) -> Value {
        let response = self
            .api
            .post(format!("{}/invoices", self.address))
            .bearer_auth(&self.token)
            .json(&self.invoice_body(client_id))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        response.json().await.expect("Failed to parse JSON")
    }

    /// Drive a draft invoice through a successful send.
    pub async fn send_invoice(&self, invoice_id: &str) -> Value {
        let response = self
            .api
            .post(format!("{}/invoices/{}/email/send", self.address, invoice_id))
            .bearer_auth(&self.token)
            .json(&json!({ "confirm": true }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Failed to parse JSON")
    }

    pub async fn get_invoice(&self, invoice_id: &str) -> Value {
        let response = self
            .api
            .get(format!("{}/invoices/{}", self.address, invoice_id))
            .bearer_auth(&self.token)
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Failed to parse JSON")
    }
}
