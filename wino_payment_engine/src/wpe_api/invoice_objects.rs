use std::fmt::Display;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use wpg_common::TokenAmount;

use crate::{
    db_types::{Account, Invoice, InvoiceId, InvoiceStatusType},
    wpe_api::errors::InvoiceApiError,
};

pub const DEFAULT_INVOICE_TTL_SECONDS: i64 = 600;
pub const DEFAULT_CLOCK_SKEW_GUARD_SECONDS: i64 = 30;
pub const DEFAULT_AMOUNT_TOLERANCE: i64 = 1;
pub const DEFAULT_MATCHING_KEY_ATTEMPTS: usize = 3;
pub const DEFAULT_POLL_BUDGET_MS: u64 = 3_000;

//--------------------------------------      MatchRules     ---------------------------------------------------------
/// The parameters of the heuristic fallback matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRules {
    /// The largest accepted difference between an invoice's expected amount and the amount received
    pub amount_tolerance: TokenAmount,
    /// How far before an invoice's creation time a transfer may be timestamped and still match it. Absorbs clock
    /// differences between this server and the ledger.
    pub clock_skew_guard: Duration,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            amount_tolerance: TokenAmount::from(DEFAULT_AMOUNT_TOLERANCE),
            clock_skew_guard: Duration::seconds(DEFAULT_CLOCK_SKEW_GUARD_SECONDS),
        }
    }
}

impl MatchRules {
    pub fn with_amount_tolerance(mut self, tolerance: TokenAmount) -> Self {
        self.amount_tolerance = tolerance;
        self
    }

    pub fn with_clock_skew_guard(mut self, guard: Duration) -> Self {
        self.clock_skew_guard = guard;
        self
    }
}

//--------------------------------------    InvoiceOptions   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceOptions {
    /// The validity window of invoices that do not specify one
    pub default_ttl: Duration,
    /// How many fresh matching keys to try before giving up on a collision
    pub matching_key_attempts: usize,
}

impl Default for InvoiceOptions {
    fn default() -> Self {
        Self {
            default_ttl: Duration::seconds(DEFAULT_INVOICE_TTL_SECONDS),
            matching_key_attempts: DEFAULT_MATCHING_KEY_ATTEMPTS,
        }
    }
}

impl InvoiceOptions {
    pub fn validate(&self) -> Result<(), InvoiceApiError> {
        if self.default_ttl <= Duration::zero() {
            return Err(InvoiceApiError::ConfigurationError("The default invoice TTL must be positive".into()));
        }
        if self.matching_key_attempts == 0 {
            return Err(InvoiceApiError::ConfigurationError("At least one matching key attempt is required".into()));
        }
        Ok(())
    }
}

//--------------------------------------   ReconcileOutcome  ---------------------------------------------------------
/// The result of reconciling a single external payment event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "invoices")]
pub enum ReconcileOutcome {
    /// The event settled exactly one invoice, which is now `Paid`.
    Matched(Invoice),
    /// More than one invoice plausibly corresponds to the event. None were paid; all were flagged for review.
    AmbiguousFlaggedForReview(Vec<InvoiceId>),
    /// No invoice corresponds to the event.
    NoMatch,
    /// The matched invoice had already been paid. Nothing was written.
    AlreadyPaid(Invoice),
    /// The matched invoice had already been declined (superseded or expired). Nothing was written.
    AlreadyDeclined(Invoice),
}

impl ReconcileOutcome {
    /// The invoice the event resolved to, if it resolved to exactly one.
    pub fn invoice(&self) -> Option<&Invoice> {
        match self {
            ReconcileOutcome::Matched(invoice) |
            ReconcileOutcome::AlreadyPaid(invoice) |
            ReconcileOutcome::AlreadyDeclined(invoice) => Some(invoice),
            ReconcileOutcome::AmbiguousFlaggedForReview(_) | ReconcileOutcome::NoMatch => None,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, ReconcileOutcome::Matched(_))
    }
}

impl Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileOutcome::Matched(i) => write!(f, "Matched invoice {}", i.id),
            ReconcileOutcome::AmbiguousFlaggedForReview(ids) => write!(f, "Ambiguous. {} invoices flagged", ids.len()),
            ReconcileOutcome::NoMatch => write!(f, "No match"),
            ReconcileOutcome::AlreadyPaid(i) => write!(f, "Invoice {} was already paid", i.id),
            ReconcileOutcome::AlreadyDeclined(i) => write!(f, "Invoice {} was already declined", i.id),
        }
    }
}

//--------------------------------------     BatchReport     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFailure {
    pub settlement_ref: String,
    pub error: String,
}

/// A summary of a batch of reconciled events. Every event is accounted for exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub received: usize,
    pub matched: Vec<InvoiceId>,
    pub already_paid: Vec<InvoiceId>,
    pub already_declined: Vec<InvoiceId>,
    pub flagged_for_review: Vec<InvoiceId>,
    /// Settlement references of events that matched nothing
    pub unmatched: Vec<String>,
    pub failures: Vec<EventFailure>,
}

impl BatchReport {
    pub fn record(&mut self, settlement_ref: &str, result: &Result<ReconcileOutcome, InvoiceApiError>) {
        self.received += 1;
        match result {
            Ok(ReconcileOutcome::Matched(invoice)) => self.matched.push(invoice.id.clone()),
            Ok(ReconcileOutcome::AlreadyPaid(invoice)) => self.already_paid.push(invoice.id.clone()),
            Ok(ReconcileOutcome::AlreadyDeclined(invoice)) => self.already_declined.push(invoice.id.clone()),
            Ok(ReconcileOutcome::AmbiguousFlaggedForReview(ids)) => self.flagged_for_review.extend(ids.iter().cloned()),
            Ok(ReconcileOutcome::NoMatch) => self.unmatched.push(settlement_ref.to_string()),
            Err(e) => {
                self.failures.push(EventFailure { settlement_ref: settlement_ref.to_string(), error: e.to_string() })
            },
        }
    }

    /// Records an event that could not even be decoded.
    pub fn record_rejected(&mut self, settlement_ref: &str, reason: String) {
        self.received += 1;
        self.failures.push(EventFailure { settlement_ref: settlement_ref.to_string(), error: reason });
    }
}

//--------------------------------------  InvoiceStatusReport ---------------------------------------------------------
/// The answer to a poll or verify request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceStatusReport {
    pub invoice_id: InvoiceId,
    pub status: InvoiceStatusType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_identity: Option<Account>,
    pub needs_review: bool,
}

impl InvoiceStatusReport {
    /// The report for an invoice whose state could not be determined.
    pub fn unknown(invoice_id: InvoiceId) -> Self {
        Self {
            invoice_id,
            status: InvoiceStatusType::Pending,
            settlement_ref: None,
            payer_identity: None,
            needs_review: false,
        }
    }
}

impl From<&Invoice> for InvoiceStatusReport {
    fn from(invoice: &Invoice) -> Self {
        Self {
            invoice_id: invoice.id.clone(),
            status: invoice.status,
            settlement_ref: invoice.settlement_ref.clone(),
            payer_identity: invoice.payer_identity.clone(),
            needs_review: invoice.needs_review,
        }
    }
}
