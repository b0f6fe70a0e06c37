mod common;

use common::{TEST_FROM, TestApp};
use invoicing_service::models::Client;
use invoicing_service::services::mailer::MockMailer;
use invoicing_service::services::store::EmailLogStore;
use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn send_attaches_pdf_and_logs_the_attempt() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client();
    let created = app.create_invoice(client_id).await;
    let invoice_id = created["invoiceId"].as_str().unwrap();

    let body = app.send_invoice(invoice_id).await;
    assert_eq!(body["message"], "Email sent successfully");
    assert!(body["messageId"].as_str().unwrap().contains('@'));
    assert_eq!(body["accepted"][0], "acme@example.com");

    // The transport saw exactly one message with the PDF attached.
    let sent = app.mailer.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["acme@example.com"]);
    assert_eq!(sent[0].subject, "Invoice #INV-100 from Asha Studio");
    let attachment = sent[0].attachment.as_ref().unwrap();
    assert_eq!(attachment.filename, "invoice-INV-100.pdf");
    assert_eq!(attachment.content_type, "application/pdf");
    assert!(attachment.bytes.starts_with(b"%PDF"));

    // Status committed only after the successful send.
    let fetched = app.get_invoice(invoice_id).await;
    assert_eq!(fetched["status"], "sent");

    // Exactly one audit row, with the full envelope.
    let response = app
        .api
        .get(format!("{}/invoices/{}/email/history", app.address, invoice_id))
        .bearer_auth(&app.token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);
    let rows: Vec<serde_json::Value> = response.json().await.expect("Failed to parse JSON");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], "sent");
    assert_eq!(rows[0]["from"], TEST_FROM);
    assert_eq!(rows[0]["to"][0], "acme@example.com");
    assert_eq!(rows[0]["subject"], "Invoice #INV-100 from Asha Studio");
    assert_eq!(rows[0]["currency"], "INR");
    assert!(rows[0]["providerMessageId"].is_string());
}

#[tokio::test]
async fn send_requires_confirmation() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client();
    let created = app.create_invoice(client_id).await;
    let invoice_id = created["invoiceId"].as_str().unwrap();

    let response = app
        .api
        .post(format!("{}/invoices/{}/email/send", app.address, invoice_id))
        .bearer_auth(&app.token)
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.mailer.sent_messages().await.is_empty());
    assert_eq!(app.get_invoice(invoice_id).await["status"], "draft");
}

#[tokio::test]
async fn send_without_any_recipient_is_rejected_with_no_audit_row() {
    let app = TestApp::spawn().await;

    // Client with no email on file, so the default draft has an empty `to`.
    let client_id = Uuid::new_v4();
    app.clients.seed(Client {
        client_id,
        name: "No Mail Co".to_string(),
        email: None,
        address: None,
        phone: None,
    });
    let created = app.create_invoice(client_id).await;
    let invoice_id = created["invoiceId"].as_str().unwrap();

    let response = app
        .api
        .post(format!("{}/invoices/{}/email/send", app.address, invoice_id))
        .bearer_auth(&app.token)
        .json(&json!({ "confirm": true }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.mailer.sent_messages().await.is_empty());
    let rows = app
        .email_logs
        .list_for_user(app.user_id, 200)
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(app.get_invoice(invoice_id).await["status"], "draft");
}

#[tokio::test]
async fn malformed_recipients_are_named_and_nothing_is_attempted() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client();
    let created = app.create_invoice(client_id).await;
    let invoice_id = created["invoiceId"].as_str().unwrap();

    let response = app
        .api
        .post(format!("{}/invoices/{}/email/send", app.address, invoice_id))
        .bearer_auth(&app.token)
        .json(&json!({ "confirm": true, "to": ["not-an-address"] }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert!(body["error"].as_str().unwrap().contains("not-an-address"));
    assert!(app.mailer.sent_messages().await.is_empty());
    assert!(app
        .email_logs
        .list_for_user(app.user_id, 200)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn verify_failure_logs_a_failed_row_and_keeps_draft() {
    let app = TestApp::spawn_with_mailer(MockMailer::failing_verify("relay down")).await;
    let client_id = app.seed_client();
    let created = app.create_invoice(client_id).await;
    let invoice_id = created["invoiceId"].as_str().unwrap();

    let response = app
        .api
        .post(format!("{}/invoices/{}/email/send", app.address, invoice_id))
        .bearer_auth(&app.token)
        .json(&json!({ "confirm": true }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(app.mailer.sent_messages().await.is_empty());

    let rows = app
        .email_logs
        .list_for_user(app.user_id, 200)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].status,
        invoicing_service::models::EmailLogStatus::Failed
    );
    assert!(rows[0].error_message.as_deref().unwrap().contains("relay down"));

    // The transition was never committed.
    assert_eq!(app.get_invoice(invoice_id).await["status"], "draft");
}

#[tokio::test]
async fn delivery_failure_logs_a_failed_row() {
    let app = TestApp::spawn_with_mailer(MockMailer::failing_send("mailbox full")).await;
    let client_id = app.seed_client();
    let created = app.create_invoice(client_id).await;
    let invoice_id = created["invoiceId"].as_str().unwrap();

    let response = app
        .api
        .post(format!("{}/invoices/{}/email/send", app.address, invoice_id))
        .bearer_auth(&app.token)
        .json(&json!({ "confirm": true }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let rows = app
        .email_logs
        .list_for_user(app.user_id, 200)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].error_message.as_deref().unwrap().contains("mailbox full"));
    assert_eq!(app.get_invoice(invoice_id).await["status"], "draft");
}

#[tokio::test]
async fn another_users_send_is_rejected_with_zero_side_effects() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client();
    let created = app.create_invoice(client_id).await;
    let invoice_id = created["invoiceId"].as_str().unwrap();

    let response = app
        .api
        .post(format!("{}/invoices/{}/email/send", app.address, invoice_id))
        .bearer_auth(app.token_for_other_user())
        .json(&json!({ "confirm": true }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.mailer.sent_messages().await.is_empty());
    assert!(app
        .email_logs
        .list_for_user(app.user_id, 200)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(app.get_invoice(invoice_id).await["status"], "draft");
}

#[tokio::test]
async fn remind_keeps_status_and_appends_history_newest_first() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client();
    let created = app.create_invoice(client_id).await;
    let invoice_id = created["invoiceId"].as_str().unwrap();

    // Reminding a draft is rejected.
    let response = app
        .api
        .post(format!("{}/invoices/{}/email/remind", app.address, invoice_id))
        .bearer_auth(&app.token)
        .json(&json!({ "confirm": true }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.send_invoice(invoice_id).await;

    let response = app
        .api
        .post(format!("{}/invoices/{}/email/remind", app.address, invoice_id))
        .bearer_auth(&app.token)
        .json(&json!({ "confirm": true }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(app.get_invoice(invoice_id).await["status"], "sent");

    let response = app
        .api
        .get(format!("{}/invoices/{}/email/history", app.address, invoice_id))
        .bearer_auth(&app.token)
        .send()
        .await
        .expect("Failed to execute request");
    let rows: Vec<serde_json::Value> = response.json().await.expect("Failed to parse JSON");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["subject"], "Reminder: invoice #INV-100 from Asha Studio");
    assert_eq!(rows[1]["subject"], "Invoice #INV-100 from Asha Studio");
}

#[tokio::test]
async fn custom_fields_override_the_default_draft() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client();
    let created = app.create_invoice(client_id).await;
    let invoice_id = created["invoiceId"].as_str().unwrap();

    let response = app
        .api
        .post(format!("{}/invoices/{}/email/send", app.address, invoice_id))
        .bearer_auth(&app.token)
        .json(&json!({
            "confirm": true,
            "to": "owner@acme.example, finance@acme.example",
            "cc": ["books@acme.example"],
            "subject": "August invoice",
            "bodyText": "See attached."
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);

    let sent = app.mailer.sent_messages().await;
    assert_eq!(sent[0].to, vec!["owner@acme.example", "finance@acme.example"]);
    assert_eq!(sent[0].cc, vec!["books@acme.example"]);
    assert_eq!(sent[0].subject, "August invoice");
    assert_eq!(sent[0].body_text, "See attached.");
}

#[tokio::test]
async fn send_in_a_display_currency_is_recorded_on_the_log() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client();
    let created = app.create_invoice(client_id).await;
    let invoice_id = created["invoiceId"].as_str().unwrap();

    let response = app
        .api
        .post(format!(
            "{}/invoices/{}/email/send?currency=usd",
            app.address, invoice_id
        ))
        .bearer_auth(&app.token)
        .json(&json!({ "confirm": true }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);

    let rows = app
        .email_logs
        .list_for_user(app.user_id, 200)
        .await
        .unwrap();
    assert_eq!(rows[0].currency, "USD");

    // The stored invoice stays in its authoring currency.
    assert_eq!(app.get_invoice(invoice_id).await["currency"], "INR");
}

#[tokio::test]
async fn unsupported_currency_is_rejected_before_any_send() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client();
    let created = app.create_invoice(client_id).await;
    let invoice_id = created["invoiceId"].as_str().unwrap();

    let response = app
        .api
        .post(format!(
            "{}/invoices/{}/email/send?currency=XXX",
            app.address, invoice_id
        ))
        .bearer_auth(&app.token)
        .json(&json!({ "confirm": true }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.mailer.sent_messages().await.is_empty());
    assert_eq!(app.get_invoice(invoice_id).await["status"], "draft");
}

#[tokio::test]
async fn draft_endpoint_prefills_the_compose_form() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client();
    let created = app.create_invoice(client_id).await;
    let invoice_id = created["invoiceId"].as_str().unwrap();

    let response = app
        .api
        .get(format!("{}/invoices/{}/email/draft", app.address, invoice_id))
        .bearer_auth(&app.token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["invoiceId"], *invoice_id);
    assert_eq!(body["currency"], "INR");
    assert_eq!(body["draft"]["to"][0], "acme@example.com");
    assert_eq!(body["draft"]["subject"], "Invoice #INV-100 from Asha Studio");
    assert!(body["draft"]["bodyText"].as_str().unwrap().contains("INV-100"));
}

#[tokio::test]
async fn global_history_spans_invoices_and_is_scoped_to_the_user() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client();

    let first = app.create_invoice(client_id).await;
    app.send_invoice(first["invoiceId"].as_str().unwrap()).await;

    let mut body = app.invoice_body(client_id);
    body["invoiceNumber"] = json!("INV-101");
    let response = app
        .api
        .post(format!("{}/invoices", app.address))
        .bearer_auth(&app.token)
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request");
    let second: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    app.send_invoice(second["invoiceId"].as_str().unwrap()).await;

    let response = app
        .api
        .get(format!("{}/email/history", app.address))
        .bearer_auth(&app.token)
        .send()
        .await
        .expect("Failed to execute request");
    let rows: Vec<serde_json::Value> = response.json().await.expect("Failed to parse JSON");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["subject"], "Invoice #INV-101 from Asha Studio");

    // Another user sees none of it.
    let response = app
        .api
        .get(format!("{}/email/history", app.address))
        .bearer_auth(app.token_for_other_user())
        .send()
        .await
        .expect("Failed to execute request");
    let rows: Vec<serde_json::Value> = response.json().await.expect("Failed to parse JSON");
    assert!(rows.is_empty());
}
