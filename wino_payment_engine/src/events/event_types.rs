use serde::{Deserialize, Serialize};

use crate::db_types::{Invoice, InvoiceId};

/// An invoice transitioned to `Paid`. Published exactly once per invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePaidEvent {
    pub invoice: Invoice,
}

impl InvoicePaidEvent {
    pub fn new(invoice: Invoice) -> Self {
        Self { invoice }
    }
}

/// A payment event matched more than one invoice and could not be resolved automatically. The invoice stays
/// `Pending` with `needs_review` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceFlaggedEvent {
    pub invoice: Invoice,
    pub settlement_ref: String,
}

impl InvoiceFlaggedEvent {
    pub fn new(invoice: Invoice, settlement_ref: String) -> Self {
        Self { invoice, settlement_ref }
    }
}

/// A pending invoice was declined because a newer invoice was issued for the same destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceAnnulledEvent {
    pub invoice: Invoice,
    pub superseded_by: InvoiceId,
}

impl InvoiceAnnulledEvent {
    pub fn new(invoice: Invoice, superseded_by: InvoiceId) -> Self {
        Self { invoice, superseded_by }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    InvoicePaid(InvoicePaidEvent),
    InvoiceFlagged(InvoiceFlaggedEvent),
    InvoiceAnnulled(InvoiceAnnulledEvent),
}
