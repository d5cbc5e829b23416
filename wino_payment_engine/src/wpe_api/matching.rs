//! Invoice matchers.
//!
//! Two strategies map an external payment event onto invoices:
//! * Reference matching is deterministic. A compliant payer copies the invoice's matching key into the transfer
//!   instruction as an auxiliary account, so a hit in the matching key index is authoritative.
//! * Fallback matching is heuristic. It is only used when no reference is found, and considers destination, amount and
//!   timing. It may produce several candidates, and the caller must decide what to do with them.
use chrono::{DateTime, Utc};
use log::*;
use wpg_common::TokenAmount;

use crate::{
    db_types::{Account, Invoice, MatchingKey},
    traits::{InvoiceStore, InvoiceStoreError},
    wpe_api::invoice_objects::MatchRules,
};

/// Looks each referenced account up in the matching key index. The first hit wins. No amount or time checks are made.
pub async fn match_by_reference<B: InvoiceStore>(
    db: &B,
    referenced_accounts: &[Account],
) -> Result<Option<Invoice>, InvoiceStoreError> {
    for account in referenced_accounts {
        let key = MatchingKey::from(account);
        if let Some(invoice) = db.fetch_invoice_by_matching_key(&key).await? {
            debug!("🔎️ Reference {key} matches invoice {}", invoice.id);
            return Ok(Some(invoice));
        }
    }
    trace!("🔎️ None of the {} referenced accounts is a matching key", referenced_accounts.len());
    Ok(None)
}

/// Scans the invoices pending for `destination` and returns those that plausibly correspond to a transfer of `amount`
/// at `occurred_at`. See [`fallback_candidates`].
pub async fn match_by_fallback<B: InvoiceStore>(
    db: &B,
    destination: &Account,
    amount: TokenAmount,
    occurred_at: DateTime<Utc>,
    rules: &MatchRules,
) -> Result<Vec<Invoice>, InvoiceStoreError> {
    let pending = db.fetch_pending_invoices(Some(destination)).await?;
    let scanned = pending.len();
    let candidates = fallback_candidates(pending, amount, occurred_at, rules);
    debug!(
        "🔎️ Fallback scan for {amount} into {destination}: {} of {scanned} pending invoices are candidates",
        candidates.len()
    );
    Ok(candidates)
}

/// Filters `invoices` down to fallback candidates for a transfer of `amount` at `occurred_at`.
pub fn fallback_candidates(
    invoices: Vec<Invoice>,
    amount: TokenAmount,
    occurred_at: DateTime<Utc>,
    rules: &MatchRules,
) -> Vec<Invoice> {
    invoices.into_iter().filter(|invoice| is_fallback_candidate(invoice, amount, occurred_at, rules)).collect()
}

/// An invoice is a fallback candidate if
/// * it has an expected amount (open-amount invoices can only be matched by reference),
/// * the amount received is within `rules.amount_tolerance` of it, and
/// * the transfer occurred between `created_at - rules.clock_skew_guard` and `expires_at`, inclusive.
pub fn is_fallback_candidate(
    invoice: &Invoice,
    amount: TokenAmount,
    occurred_at: DateTime<Utc>,
    rules: &MatchRules,
) -> bool {
    let Some(expected) = invoice.expected_amount else {
        return false;
    };
    if expected.abs_diff(amount) > rules.amount_tolerance {
        return false;
    }
    let window_opens = invoice.created_at - rules.clock_skew_guard;
    occurred_at >= window_opens && occurred_at <= invoice.expires_at
}
