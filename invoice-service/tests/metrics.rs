//! Metric accounting tests. Kept in their own binary so the
//! process-global counters are not disturbed by concurrent tests.

mod common;

use common::TestApp;
use invoice_service::services::metrics::INVOICES_TOTAL;
use serde_json::json;

#[tokio::test]
async fn paying_twice_counts_a_single_paid_transition() {
    let app = TestApp::spawn().await;
    let customer_id = app.seed_customer("Acme").await;
    let item_id = app.seed_item("Widget", "9.99").await;
    let invoice = app
        .seed_invoice(customer_id, json!([{ "item_id": item_id, "quantity": 1 }]))
        .await;
    let pay_url = app.url(&format!("/api/invoices/{}/pay", invoice["id"].as_str().unwrap()));

    let before = INVOICES_TOTAL.with_label_values(&["paid"]).get();

    for _ in 0..2 {
        let response = app
            .client
            .post(&pay_url)
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), 200);
    }

    let after = INVOICES_TOTAL.with_label_values(&["paid"]).get();
    assert_eq!(after - before, 1.0);

    app.cleanup().await;
}
