use std::time::Duration;

use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Utc;
use serde_json::json;
use wino_payment_engine::{db_types::InvoiceStatusType, invoice_objects::BatchReport, InvoiceStore};

use super::{
    helpers::{configure_app, issue_invoice, random_account, send_request, test_db, WEBHOOK_SECRET},
    mocks::MockLedger,
};

const BUDGET: Duration = Duration::from_millis(500);

fn webhook_request(secret: Option<&str>, body: serde_json::Value) -> TestRequest {
    let mut req = TestRequest::post().uri("/webhook/transfers").set_json(body);
    if let Some(secret) = secret {
        req = req.insert_header(("Authorization", format!("Bearer {secret}")));
    }
    req
}

#[actix_web::test]
async fn webhook_without_configured_secret() {
    let db = test_db().await;
    let req = webhook_request(Some(WEBHOOK_SECRET), json!([]));
    let (status, body) = send_request(req, configure_app(db, MockLedger::new(), None, BUDGET)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("not configured"));
}

#[actix_web::test]
async fn webhook_with_wrong_secret() {
    let db = test_db().await;
    let req = webhook_request(Some("guess"), json!([]));
    let (status, _) = send_request(req, configure_app(db.clone(), MockLedger::new(), Some(WEBHOOK_SECRET), BUDGET)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = webhook_request(None, json!([]));
    let (status, _) = send_request(req, configure_app(db, MockLedger::new(), Some(WEBHOOK_SECRET), BUDGET)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn webhook_with_unparseable_body() {
    let db = test_db().await;
    let req = TestRequest::post()
        .uri("/webhook/transfers")
        .insert_header(("Authorization", format!("Bearer {WEBHOOK_SECRET}")))
        .set_payload("this is not json");
    let (status, body) = send_request(req, configure_app(db, MockLedger::new(), Some(WEBHOOK_SECRET), BUDGET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("error"));
}

#[actix_web::test]
async fn referenced_transfer_settles_invoice() {
    let db = test_db().await;
    let destination = random_account();
    let invoice = issue_invoice(&db, &destination, 1_000_000).await;
    let event = json!({
        "settlement_ref": "sig-webhook-1",
        "destination": destination,
        "amount": 1_000_000,
        "referenced_accounts": [invoice.matching_key.to_account()],
        "occurred_at": Utc::now().timestamp(),
    });
    let req = webhook_request(Some(WEBHOOK_SECRET), event);
    let (status, body) =
        send_request(req, configure_app(db.clone(), MockLedger::new(), Some(WEBHOOK_SECRET), BUDGET)).await;
    assert_eq!(status, StatusCode::OK);
    let report: BatchReport = serde_json::from_str(&body).expect("Invalid batch report");
    assert_eq!(report.received, 1);
    assert_eq!(report.matched, vec![invoice.id.clone()]);

    let stored = db.fetch_invoice(&invoice.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvoiceStatusType::Paid);
    assert_eq!(stored.settlement_ref.as_deref(), Some("sig-webhook-1"));
}

#[actix_web::test]
async fn enhanced_transaction_settles_invoice() {
    let db = test_db().await;
    // Invoices are paid into the merchant's token account, not the wallet that owns it
    let destination = random_account();
    let owner = random_account();
    let payer = random_account();
    let invoice = issue_invoice(&db, &destination, 2_500_000).await;
    let tx = json!([{
        "signature": "sig-enhanced-1",
        "timestamp": Utc::now().timestamp(),
        "feePayer": payer,
        "tokenTransfers": [{
            "fromUserAccount": payer,
            "toUserAccount": owner,
            "toTokenAccount": destination,
            "tokenAmount": 2.5,
            "mint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"
        }],
        "accountData": [{ "account": payer }, { "account": destination }, { "account": invoice.matching_key }]
    }]);
    let req = webhook_request(Some(WEBHOOK_SECRET), tx);
    let (status, body) =
        send_request(req, configure_app(db.clone(), MockLedger::new(), Some(WEBHOOK_SECRET), BUDGET)).await;
    assert_eq!(status, StatusCode::OK);
    let report: BatchReport = serde_json::from_str(&body).expect("Invalid batch report");
    assert_eq!(report.matched, vec![invoice.id.clone()]);

    let stored = db.fetch_invoice(&invoice.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvoiceStatusType::Paid);
    assert_eq!(stored.payer_identity, Some(payer));
}

#[actix_web::test]
async fn mixed_batch_is_accepted() {
    let db = test_db().await;
    let destination = random_account();
    let invoice = issue_invoice(&db, &destination, 1_000_000).await;
    let batch = json!([
        { "settlement_ref": "sig-unrelated", "destination": random_account(), "amount": 5, "occurred_at": Utc::now().timestamp() },
        { "settlement_ref": "sig-garbage", "destination": "nope", "amount": "lots" },
        { "settlement_ref": "sig-fallback", "destination": destination, "amount": 1_000_000, "occurred_at": Utc::now().timestamp() },
    ]);
    let req = webhook_request(Some(WEBHOOK_SECRET), batch);
    let (status, body) =
        send_request(req, configure_app(db.clone(), MockLedger::new(), Some(WEBHOOK_SECRET), BUDGET)).await;
    assert_eq!(status, StatusCode::OK);
    let report: BatchReport = serde_json::from_str(&body).expect("Invalid batch report");
    assert_eq!(report.received, 3);
    assert_eq!(report.matched, vec![invoice.id.clone()]);
    assert_eq!(report.unmatched, vec!["sig-unrelated".to_string()]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].settlement_ref, "sig-garbage");

    // Redelivery is harmless
    let batch = json!({ "settlement_ref": "sig-fallback", "destination": destination, "amount": 1_000_000, "occurred_at": Utc::now().timestamp() });
    let req = webhook_request(Some(WEBHOOK_SECRET), batch);
    let (status, body) =
        send_request(req, configure_app(db.clone(), MockLedger::new(), Some(WEBHOOK_SECRET), BUDGET)).await;
    assert_eq!(status, StatusCode::OK);
    let report: BatchReport = serde_json::from_str(&body).expect("Invalid batch report");
    assert!(report.matched.is_empty());
    let stored = db.fetch_invoice(&invoice.id).await.unwrap().unwrap();
    assert_eq!(stored.settlement_ref.as_deref(), Some("sig-fallback"));
}
