use std::time::{Duration, Instant};

use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Utc;
use wino_payment_engine::{
    db_types::{ExternalPaymentEvent, Invoice, InvoiceStatusType},
    invoice_objects::InvoiceStatusReport,
    InvoiceStore,
    LedgerError,
};
use wpg_common::TokenAmount;

use super::{
    helpers::{configure_app, issue_invoice, random_account, send_request, test_db},
    mocks::{MockLedger, SlowLedger},
};

const BUDGET: Duration = Duration::from_millis(500);

fn transfer_for(invoice: &Invoice, settlement_ref: &str, amount: i64) -> ExternalPaymentEvent {
    ExternalPaymentEvent::new(
        settlement_ref.to_string(),
        invoice.merchant_destination.clone(),
        TokenAmount::from(amount),
        Utc::now(),
    )
}

fn parse_report(body: &str) -> InvoiceStatusReport {
    serde_json::from_str(body).expect("Invalid status report")
}

#[actix_web::test]
async fn poll_unknown_invoice() {
    let db = test_db().await;
    let req = TestRequest::get().uri("/api/invoice/nope/poll");
    let (status, _) = send_request(req, configure_app(db.clone(), MockLedger::new(), None, BUDGET)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let req = TestRequest::post().uri("/api/invoice/nope/verify");
    let (status, _) = send_request(req, configure_app(db, MockLedger::new(), None, BUDGET)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn poll_settles_from_recent_transfers() {
    let db = test_db().await;
    let invoice = issue_invoice(&db, &random_account(), 1_000_000).await;
    let mut ledger = MockLedger::new();
    let transfers = vec![transfer_for(&invoice, "sig-small", 10), transfer_for(&invoice, "sig-poll", 1_000_000)];
    let destination = invoice.merchant_destination.clone();
    ledger
        .expect_decode_recent_transfers()
        .withf(move |d, _| d == &destination)
        .times(1)
        .returning(move |_, _| Ok(transfers.clone()));
    let req = TestRequest::get().uri(&format!("/api/invoice/{}/poll", invoice.id.as_str()));
    let (status, body) = send_request(req, configure_app(db.clone(), ledger, None, BUDGET)).await;
    assert_eq!(status, StatusCode::OK);
    let report = parse_report(&body);
    assert_eq!(report.status, InvoiceStatusType::Paid);
    assert_eq!(report.settlement_ref.as_deref(), Some("sig-poll"));
    let stored = db.fetch_invoice(&invoice.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvoiceStatusType::Paid);
}

#[actix_web::test]
async fn poll_of_a_paid_invoice_does_not_touch_the_ledger() {
    let db = test_db().await;
    let invoice = issue_invoice(&db, &random_account(), 1_000_000).await;
    let mut paid = invoice.clone();
    paid.status = InvoiceStatusType::Paid;
    paid.settlement_ref = Some("sig-earlier".into());
    paid.paid_at = Some(invoice.created_at);
    db.save_invoice(&paid).await.unwrap();
    let mut ledger = MockLedger::new();
    ledger.expect_decode_recent_transfers().never();
    let req = TestRequest::get().uri(&format!("/api/invoice/{}/poll", invoice.id.as_str()));
    let (status, body) = send_request(req, configure_app(db, ledger, None, BUDGET)).await;
    assert_eq!(status, StatusCode::OK);
    let report = parse_report(&body);
    assert_eq!(report.status, InvoiceStatusType::Paid);
    assert_eq!(report.settlement_ref.as_deref(), Some("sig-earlier"));
}

#[actix_web::test]
async fn slow_ledger_poll_reports_pending() {
    let db = test_db().await;
    let invoice = issue_invoice(&db, &random_account(), 1_000_000).await;
    let req = TestRequest::get().uri(&format!("/api/invoice/{}/poll", invoice.id.as_str()));
    let start = Instant::now();
    let (status, body) = send_request(req, configure_app(db, SlowLedger, None, Duration::from_millis(100))).await;
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(status, StatusCode::OK);
    let report = parse_report(&body);
    assert_eq!(report.status, InvoiceStatusType::Pending);
}

#[actix_web::test]
async fn unavailable_ledger_poll_reports_pending() {
    let db = test_db().await;
    let invoice = issue_invoice(&db, &random_account(), 1_000_000).await;
    let mut ledger = MockLedger::new();
    ledger.expect_decode_recent_transfers().returning(|_, _| Err(LedgerError::Unavailable("connection refused".into())));
    ledger.expect_find_by_settlement_reference().returning(|_| Err(LedgerError::Unavailable("connection refused".into())));
    let req = TestRequest::get().uri(&format!("/api/invoice/{}/poll", invoice.id.as_str()));
    let (status, body) = send_request(req, configure_app(db.clone(), ledger, None, BUDGET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_report(&body).status, InvoiceStatusType::Pending);

    let mut ledger = MockLedger::new();
    ledger.expect_find_by_settlement_reference().returning(|_| Err(LedgerError::Unavailable("connection refused".into())));
    let req = TestRequest::post().uri(&format!("/api/invoice/{}/verify", invoice.id.as_str()));
    let (status, body) = send_request(req, configure_app(db, ledger, None, BUDGET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_report(&body).status, InvoiceStatusType::Pending);
}

#[actix_web::test]
async fn verify_settles_referenced_transfer() {
    let db = test_db().await;
    let invoice = issue_invoice(&db, &random_account(), 1_000_000).await;
    let payer = random_account();
    let transfer =
        transfer_for(&invoice, "sig-verify", 1_000_000).with_reference(invoice.matching_key.to_account()).with_sender(payer.clone());
    let key = invoice.matching_key.clone();
    let mut ledger = MockLedger::new();
    ledger
        .expect_find_by_settlement_reference()
        .withf(move |k| k == &key)
        .times(1)
        .returning(move |_| Ok(Some(transfer.clone())));
    let req = TestRequest::post().uri(&format!("/api/invoice/{}/verify", invoice.id.as_str()));
    let (status, body) = send_request(req, configure_app(db, ledger, None, BUDGET)).await;
    assert_eq!(status, StatusCode::OK);
    let report = parse_report(&body);
    assert_eq!(report.status, InvoiceStatusType::Paid);
    assert_eq!(report.settlement_ref.as_deref(), Some("sig-verify"));
    assert_eq!(report.payer_identity, Some(payer));
}

#[actix_web::test]
async fn verify_without_ledger_hit_reports_stored_status() {
    let db = test_db().await;
    let invoice = issue_invoice(&db, &random_account(), 1_000_000).await;
    let mut ledger = MockLedger::new();
    ledger.expect_find_by_settlement_reference().times(1).returning(|_| Ok(None));
    let req = TestRequest::post().uri(&format!("/api/invoice/{}/verify", invoice.id.as_str()));
    let (status, body) = send_request(req, configure_app(db, ledger, None, BUDGET)).await;
    assert_eq!(status, StatusCode::OK);
    let report = parse_report(&body);
    assert_eq!(report.status, InvoiceStatusType::Pending);
    assert!(report.settlement_ref.is_none());
    assert!(!body.contains("payer_identity"));
}

#[actix_web::test]
async fn store_failure_reports_pending() {
    let db = test_db().await;
    let invoice = issue_invoice(&db, &random_account(), 1_000_000).await;
    db.pool().close().await;
    let req = TestRequest::get().uri(&format!("/api/invoice/{}/poll", invoice.id.as_str()));
    let (status, body) = send_request(req, configure_app(db, MockLedger::new(), None, BUDGET)).await;
    assert_eq!(status, StatusCode::OK);
    let report = parse_report(&body);
    assert_eq!(report.invoice_id, invoice.id);
    assert_eq!(report.status, InvoiceStatusType::Pending);
}
