use chrono::Duration;
use cucumber::{then, when};
use wino_payment_engine::{
    db_types::{ExternalPaymentEvent, InvoiceStatusType, NewInvoice},
    invoice_objects::ReconcileOutcome,
    InvoiceStore,
};
use wpg_common::TokenAmount;

use crate::cucumber::InvoiceWorld;

// ----------------------------------------------   Lifecycle  ----------------------------------------------------------

#[when(expr = "merchant {word} issues invoice {word} for {int} units")]
async fn issue_invoice(world: &mut InvoiceWorld, merchant: String, alias: String, amount: i64) {
    let destination = world.merchant(&merchant);
    let request = NewInvoice::new(destination).with_amount(TokenAmount::from(amount));
    create(world, alias, request).await;
}

#[when(expr = "merchant {word} issues invoice {word} for {int} units with a TTL of {int} seconds")]
async fn issue_invoice_with_ttl(world: &mut InvoiceWorld, merchant: String, alias: String, amount: i64, ttl: i64) {
    let destination = world.merchant(&merchant);
    let request = NewInvoice::new(destination).with_amount(TokenAmount::from(amount)).with_ttl(Duration::seconds(ttl));
    create(world, alias, request).await;
}

#[when(expr = "merchant {word} issues open-amount invoice {word}")]
async fn issue_open_invoice(world: &mut InvoiceWorld, merchant: String, alias: String) {
    let destination = world.merchant(&merchant);
    create(world, alias, NewInvoice::new(destination)).await;
}

#[when(expr = "merchant {word} tries to issue an invoice with a TTL of {int} seconds")]
async fn issue_invalid_invoice(world: &mut InvoiceWorld, merchant: String, ttl: i64) {
    let destination = world.merchant(&merchant);
    let request = NewInvoice::new(destination).with_ttl(Duration::seconds(ttl));
    world.last_error = world.system().lifecycle.create_invoice(request).await.err();
}

async fn create(world: &mut InvoiceWorld, alias: String, request: NewInvoice) {
    let invoice = world.system().lifecycle.create_invoice(request).await.expect("Error creating invoice");
    world.invoices.insert(alias, invoice);
}

#[when(expr = "{int} seconds pass")]
async fn time_passes(world: &mut InvoiceWorld, seconds: i64) {
    world.system().clock.advance(Duration::seconds(seconds));
}

// ----------------------------------------------   Transfers  ----------------------------------------------------------

#[when(expr = "transfer [{word}] of {int} units to merchant {word} arrives referencing invoice {word}")]
async fn referenced_transfer(world: &mut InvoiceWorld, sig: String, amount: i64, merchant: String, alias: String) {
    let key = world.invoice(&alias).matching_key.to_account();
    let event = transfer(world, sig, amount, merchant).with_reference(key);
    reconcile(world, event).await;
}

#[when(expr = "transfer [{word}] of {int} units to merchant {word} arrives without a reference")]
async fn plain_transfer(world: &mut InvoiceWorld, sig: String, amount: i64, merchant: String) {
    let event = transfer(world, sig, amount, merchant);
    reconcile(world, event).await;
}

#[when(expr = "transfer [{word}] is delivered again")]
async fn redeliver(world: &mut InvoiceWorld, sig: String) {
    let event = world.transfers.get(&sig).cloned().unwrap_or_else(|| panic!("Transfer {sig} was never delivered"));
    reconcile(world, event).await;
}

#[when(expr = "the ledger records transfer [{word}] of {int} units to merchant {word} referencing invoice {word}")]
async fn ledger_referenced_transfer(world: &mut InvoiceWorld, sig: String, amount: i64, merchant: String, alias: String) {
    let key = world.invoice(&alias).matching_key.to_account();
    let event = transfer(world, sig, amount, merchant).with_reference(key);
    world.system().ledger.record(event);
}

#[when(expr = "the ledger records transfer [{word}] of {int} units to merchant {word}")]
async fn ledger_plain_transfer(world: &mut InvoiceWorld, sig: String, amount: i64, merchant: String) {
    let event = transfer(world, sig, amount, merchant);
    world.system().ledger.record(event);
}

fn transfer(world: &mut InvoiceWorld, sig: String, amount: i64, merchant: String) -> ExternalPaymentEvent {
    let destination = world.merchant(&merchant);
    ExternalPaymentEvent::new(sig, destination, TokenAmount::from(amount), world.now())
}

async fn reconcile(world: &mut InvoiceWorld, event: ExternalPaymentEvent) {
    let outcome = world.system().ingestion.reconciler().reconcile(&event).await;
    world.transfers.insert(event.settlement_ref.clone(), event);
    world.last_outcome = Some(outcome);
}

// ----------------------------------------------   Channels   ----------------------------------------------------------

#[when(expr = "the client polls invoice {word}")]
async fn poll(world: &mut InvoiceWorld, alias: String) {
    let id = world.invoice(&alias).id.clone();
    world.last_report = world.system().ingestion.handle_poll(&id).await;
}

#[when(expr = "the client verifies invoice {word}")]
async fn verify(world: &mut InvoiceWorld, alias: String) {
    let id = world.invoice(&alias).id.clone();
    world.last_report = world.system().ingestion.handle_verify(&id).await;
}

// ----------------------------------------------   Assertions ----------------------------------------------------------

#[then(expr = "the outcome is {word}")]
async fn check_outcome(world: &mut InvoiceWorld, expected: String) {
    let outcome = world.last_outcome.as_ref().expect("No transfer has been reconciled");
    let outcome = outcome.as_ref().expect("Reconciliation failed");
    let actual = match outcome {
        ReconcileOutcome::Matched(_) => "Matched",
        ReconcileOutcome::AmbiguousFlaggedForReview(_) => "AmbiguousFlaggedForReview",
        ReconcileOutcome::NoMatch => "NoMatch",
        ReconcileOutcome::AlreadyPaid(_) => "AlreadyPaid",
        ReconcileOutcome::AlreadyDeclined(_) => "AlreadyDeclined",
    };
    assert_eq!(actual, expected, "Unexpected outcome: {outcome:?}");
}

#[then(expr = "the outcome is a match for invoice {word}")]
async fn check_matched_invoice(world: &mut InvoiceWorld, alias: String) {
    let expected = world.invoice(&alias).id.clone();
    let outcome = world.last_outcome.as_ref().expect("No transfer has been reconciled").as_ref().expect("Failed");
    match outcome {
        ReconcileOutcome::Matched(invoice) => assert_eq!(invoice.id, expected),
        other => panic!("Expected a match, got {other:?}"),
    }
}

#[then(expr = "invoice {word} is {word}")]
async fn check_status(world: &mut InvoiceWorld, alias: String, status: String) {
    let id = world.invoice(&alias).id.clone();
    let invoice = world.system().lifecycle.get_invoice(&id).await.expect("Error fetching invoice").expect("Missing");
    let expected = status.parse::<InvoiceStatusType>().expect("Not a valid status");
    assert_eq!(invoice.status, expected, "Invoice {alias} has the wrong status");
}

#[then(expr = "invoice {word} is stored as {word}")]
async fn check_stored_status(world: &mut InvoiceWorld, alias: String, status: String) {
    let id = world.invoice(&alias).id.clone();
    let invoice = world.system().db.fetch_invoice(&id).await.expect("Error fetching invoice").expect("Missing");
    let expected = status.parse::<InvoiceStatusType>().expect("Not a valid status");
    assert_eq!(invoice.status, expected, "Invoice {alias} has the wrong stored status");
}

#[then(expr = "invoice {word} was settled by [{word}]")]
async fn check_settlement(world: &mut InvoiceWorld, alias: String, sig: String) {
    let id = world.invoice(&alias).id.clone();
    let invoice = world.system().db.fetch_invoice(&id).await.expect("Error fetching invoice").expect("Missing");
    assert_eq!(invoice.settlement_ref.as_deref(), Some(sig.as_str()));
    let paid_at = invoice.paid_at.expect("A paid invoice has a payment time");
    assert!(paid_at >= invoice.created_at);
}

#[then(expr = "invoice {word} was paid at {int} seconds after launch")]
async fn check_paid_at(world: &mut InvoiceWorld, alias: String, offset: i64) {
    let id = world.invoice(&alias).id.clone();
    let invoice = world.system().db.fetch_invoice(&id).await.expect("Error fetching invoice").expect("Missing");
    let expected = super::invoice_world::t0() + Duration::seconds(offset);
    assert_eq!(invoice.paid_at, Some(expected));
}

#[then(expr = "invoice {word} needs review because of [{word}]")]
async fn check_needs_review(world: &mut InvoiceWorld, alias: String, sig: String) {
    let id = world.invoice(&alias).id.clone();
    let invoice = world.system().db.fetch_invoice(&id).await.expect("Error fetching invoice").expect("Missing");
    assert!(invoice.needs_review, "Invoice {alias} is not flagged for review");
    assert_eq!(invoice.review_refs, vec![sig]);
}

#[then(expr = "invoice {word} does not need review")]
async fn check_no_review(world: &mut InvoiceWorld, alias: String) {
    let id = world.invoice(&alias).id.clone();
    let invoice = world.system().db.fetch_invoice(&id).await.expect("Error fetching invoice").expect("Missing");
    assert!(!invoice.needs_review);
}

#[then(expr = "merchant {word} has {int} pending invoice(s)")]
async fn check_pending_count(world: &mut InvoiceWorld, merchant: String, count: usize) {
    let destination = world.merchant(&merchant);
    let pending = world.system().lifecycle.list_pending(Some(&destination)).await.expect("Error listing invoices");
    assert_eq!(pending.len(), count);
}

#[then(expr = "the reported status is {word}")]
async fn check_report(world: &mut InvoiceWorld, status: String) {
    let report = world.last_report.as_ref().expect("No status has been reported");
    let expected = status.parse::<InvoiceStatusType>().expect("Not a valid status");
    assert_eq!(report.status, expected, "Unexpected report: {report:?}");
}

#[then(expr = "the request is rejected as invalid")]
async fn check_rejected(world: &mut InvoiceWorld) {
    let err = world.last_error.as_ref().expect("The request was not rejected");
    assert!(matches!(err, wino_payment_engine::InvoiceApiError::InvalidInvoice(_)), "Unexpected error: {err}");
}
