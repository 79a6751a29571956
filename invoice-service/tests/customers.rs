//! Customer CRUD endpoint tests.

mod common;

use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
async fn create_and_get_customer() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/api/customers"))
        .json(&json!({
            "name": "Acme Corp",
            "email": "billing@acme.example",
            "address": "42 Industrial Way"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 201);
    let created: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(created["name"], "Acme Corp");
    assert_eq!(created["email"], "billing@acme.example");
    let id = created["id"].as_str().expect("missing id");

    let response = app
        .client
        .get(app.url(&format!("/api/customers/{}", id)))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    let fetched: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(fetched["id"], created["id"]);
    assert_eq!(fetched["address"], "42 Industrial Way");

    app.cleanup().await;
}

#[tokio::test]
async fn create_customer_rejects_invalid_input() {
    let app = TestApp::spawn().await;

    // Empty name
    let response = app
        .client
        .post(app.url("/api/customers"))
        .json(&json!({ "name": "", "email": "a@b.example", "address": "" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 422);

    // Malformed email
    let response = app
        .client
        .post(app.url("/api/customers"))
        .json(&json!({ "name": "Acme", "email": "not-an-email", "address": "" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 422);

    app.cleanup().await;
}

#[tokio::test]
async fn get_unknown_customer_returns_404() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url(&format!("/api/customers/{}", uuid::Uuid::new_v4())))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn update_customer_replaces_all_fields() {
    let app = TestApp::spawn().await;
    let id = app.seed_customer("Before Update").await;

    let response = app
        .client
        .put(app.url(&format!("/api/customers/{}", id)))
        .json(&json!({
            "name": "After Update",
            "email": "after@update.example",
            "address": "New address"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(updated["name"], "After Update");
    assert_eq!(updated["email"], "after@update.example");
    assert_eq!(updated["address"], "New address");

    app.cleanup().await;
}

#[tokio::test]
async fn delete_customer_removes_it() {
    let app = TestApp::spawn().await;
    let id = app.seed_customer("Short Lived").await;

    let response = app
        .client
        .delete(app.url(&format!("/api/customers/{}", id)))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 204);

    let response = app
        .client
        .get(app.url(&format!("/api/customers/{}", id)))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn delete_customer_with_invoices_is_rejected() {
    let app = TestApp::spawn().await;
    let customer_id = app.seed_customer("Has Invoices").await;
    let item_id = app.seed_item("Widget", "9.99").await;
    app.seed_invoice(customer_id, json!([{ "item_id": item_id, "quantity": 1 }]))
        .await;

    let response = app
        .client
        .delete(app.url(&format!("/api/customers/{}", customer_id)))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 409);

    // Customer is still there.
    let response = app
        .client
        .get(app.url(&format!("/api/customers/{}", customer_id)))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);

    app.cleanup().await;
}

#[tokio::test]
async fn list_customers_paginates() {
    let app = TestApp::spawn().await;
    for i in 0..3 {
        app.seed_customer(&format!("Customer {}", i)).await;
    }

    let response = app
        .client
        .get(app.url("/api/customers?page=1&limit=2"))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);
    let page1: Vec<Value> = response.json().await.expect("Invalid JSON");
    assert_eq!(page1.len(), 2);

    let response = app
        .client
        .get(app.url("/api/customers?page=2&limit=2"))
        .send()
        .await
        .expect("Failed to execute request");
    let page2: Vec<Value> = response.json().await.expect("Invalid JSON");
    assert_eq!(page2.len(), 1);
    assert_ne!(page1[0]["id"], page2[0]["id"]);

    app.cleanup().await;
}

#[tokio::test]
async fn list_customers_with_huge_page_returns_empty_not_error() {
    let app = TestApp::spawn().await;
    app.seed_customer("Somewhere Early").await;

    let response = app
        .client
        .get(app.url(&format!("/api/customers?page={}&limit=10", i64::MAX)))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    let customers: Vec<Value> = response.json().await.expect("Invalid JSON");
    assert!(customers.is_empty());

    app.cleanup().await;
}

#[tokio::test]
async fn list_customers_tolerates_bad_pagination_params() {
    let app = TestApp::spawn().await;
    app.seed_customer("Only One").await;

    let response = app
        .client
        .get(app.url("/api/customers?page=abc&limit=-5"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    let customers: Vec<Value> = response.json().await.expect("Invalid JSON");
    assert_eq!(customers.len(), 1);

    app.cleanup().await;
}
