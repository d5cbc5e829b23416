use std::{cmp::max, fmt::Debug};

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{ExternalPaymentEvent, Invoice, InvoiceStatusType},
    events::{EventProducers, InvoiceFlaggedEvent, InvoicePaidEvent},
    helpers::{truncate_to_seconds, Clock, SystemClock},
    traits::InvoiceStore,
    wpe_api::{
        errors::InvoiceApiError,
        invoice_objects::{BatchReport, MatchRules, ReconcileOutcome},
        matching::{is_fallback_candidate, match_by_fallback, match_by_reference},
    },
};

/// `ReconciliationApi` maps external payment events onto invoices. Every ingestion channel funnels through here.
///
/// The transition to `Paid` is idempotent and monotone. It is a read-then-write of a single invoice record, so
/// concurrent or repeated deliveries of the same settlement converge on the same final state.
pub struct ReconciliationApi<B, C = SystemClock> {
    db: B,
    clock: C,
    rules: MatchRules,
    producers: EventProducers,
}

impl<B, C> Debug for ReconciliationApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({:?})", self.rules)
    }
}

impl<B> ReconciliationApi<B, SystemClock> {
    pub fn new(db: B, rules: MatchRules, producers: EventProducers) -> Self {
        Self::new_with_clock(db, SystemClock, rules, producers)
    }
}

impl<B, C> ReconciliationApi<B, C> {
    pub fn new_with_clock(db: B, clock: C, rules: MatchRules, producers: EventProducers) -> Self {
        Self { db, clock, rules, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn rules(&self) -> &MatchRules {
        &self.rules
    }
}

impl<B, C> ReconciliationApi<B, C>
where
    B: InvoiceStore,
    C: Clock,
{
    /// Reconciles a single payment event.
    ///
    /// 1. If any referenced account is an issued matching key, and the funds went to that invoice's destination, the
    ///    invoice is settled. No amount or time checks are made.
    /// 2. Otherwise, the fallback matcher looks for pending invoices with a compatible destination, amount and time.
    ///    * No candidates: [`ReconcileOutcome::NoMatch`].
    ///    * One candidate: it is settled.
    ///    * More than one: every candidate is flagged for review, and none is paid.
    pub async fn reconcile(&self, event: &ExternalPaymentEvent) -> Result<ReconcileOutcome, InvoiceApiError> {
        trace!("🔄️ Reconciling settlement {}", event.settlement_ref);
        if let Some(invoice) = match_by_reference(&self.db, &event.referenced_accounts).await? {
            if invoice.merchant_destination == event.destination {
                return self.settle(invoice, event).await;
            }
            // Every leg of a multi-transfer transaction carries the same references
            debug!(
                "🔄️ Settlement {} references invoice {}, but was paid into {} rather than {}. Trying the fallback \
                 matcher.",
                event.settlement_ref, invoice.id, event.destination, invoice.merchant_destination
            );
        }
        let mut candidates =
            match_by_fallback(&self.db, &event.destination, event.amount, event.occurred_at, &self.rules).await?;
        match candidates.len() {
            0 => {
                info!(
                    "🔄️ Settlement {} ({} into {}) matches no invoice. It will be ignored.",
                    event.settlement_ref, event.amount, event.destination
                );
                Ok(ReconcileOutcome::NoMatch)
            },
            1 => {
                let invoice = candidates.remove(0);
                debug!("🔄️ Settlement {} matches invoice {} by amount and timing", event.settlement_ref, invoice.id);
                self.settle(invoice, event).await
            },
            n => {
                warn!(
                    "🔄️ Settlement {} is ambiguous: {n} invoices could correspond to it. Flagging them all for review.",
                    event.settlement_ref
                );
                self.flag_for_review(candidates, event).await
            },
        }
    }

    /// Reconciles every event independently. A failure on one event is recorded in the report and never affects the
    /// others.
    pub async fn reconcile_batch(&self, events: &[ExternalPaymentEvent]) -> BatchReport {
        let mut report = BatchReport::default();
        for event in events {
            let result = self.reconcile(event).await;
            if let Err(e) = &result {
                error!("🔄️ Could not reconcile settlement {}. {e}", event.settlement_ref);
            }
            report.record(&event.settlement_ref, &result);
        }
        debug!(
            "🔄️ Batch of {} events reconciled. {} matched, {} unmatched, {} failed",
            report.received,
            report.matched.len(),
            report.unmatched.len(),
            report.failures.len()
        );
        report
    }

    /// Reconciles `event` against a single invoice only.
    ///
    /// The event settles the invoice if it references the invoice's matching key and pays into the invoice's
    /// destination, or, failing a reference, if the invoice is a fallback candidate for it. An event that references a
    /// *different* invoice never matches this one.
    pub async fn reconcile_for_invoice(
        &self,
        event: &ExternalPaymentEvent,
        invoice: &Invoice,
    ) -> Result<ReconcileOutcome, InvoiceApiError> {
        if event.references(&invoice.matching_key) {
            if event.destination == invoice.merchant_destination {
                return self.settle(invoice.clone(), event).await;
            }
            trace!(
                "🔄️ Settlement {} references invoice {}, but pays {}",
                event.settlement_ref,
                invoice.id,
                event.destination
            );
            return Ok(ReconcileOutcome::NoMatch);
        }
        if let Some(other) = match_by_reference(&self.db, &event.referenced_accounts).await? {
            trace!("🔄️ Settlement {} belongs to invoice {}, not {}", event.settlement_ref, other.id, invoice.id);
            return Ok(ReconcileOutcome::NoMatch);
        }
        let compatible = invoice.is_pending() &&
            event.destination == invoice.merchant_destination &&
            is_fallback_candidate(invoice, event.amount, event.occurred_at, &self.rules);
        if compatible {
            debug!("🔄️ Settlement {} matches invoice {} by amount and timing", event.settlement_ref, invoice.id);
            self.settle(invoice.clone(), event).await
        } else {
            Ok(ReconcileOutcome::NoMatch)
        }
    }

    /// The idempotent transition to `Paid`. Terminal invoices are never written to.
    ///
    /// The status is checked against a fresh read of the record, since the caller's copy may predate a settlement that
    /// arrived through another channel.
    async fn settle(&self, invoice: Invoice, event: &ExternalPaymentEvent) -> Result<ReconcileOutcome, InvoiceApiError> {
        let invoice = self.db.fetch_invoice(&invoice.id).await?.unwrap_or(invoice);
        match invoice.status {
            InvoiceStatusType::Paid => {
                if invoice.settlement_ref.as_deref() == Some(event.settlement_ref.as_str()) {
                    debug!("🔄️ Settlement {} was already applied to invoice {}", event.settlement_ref, invoice.id);
                } else {
                    warn!(
                        "🔄️ Invoice {} was already paid by {}, but settlement {} also matches it. This is probably a \
                         double payment and may need a refund.",
                        invoice.id,
                        invoice.settlement_ref.as_deref().unwrap_or("(unknown)"),
                        event.settlement_ref
                    );
                }
                Ok(ReconcileOutcome::AlreadyPaid(invoice))
            },
            InvoiceStatusType::Declined => {
                warn!(
                    "🔄️ Settlement {} ({}) matches invoice {}, which has been declined. The payment may need a refund.",
                    event.settlement_ref, event.amount, invoice.id
                );
                Ok(ReconcileOutcome::AlreadyDeclined(invoice))
            },
            InvoiceStatusType::Pending => {
                let mut invoice = invoice;
                invoice.status = InvoiceStatusType::Paid;
                invoice.settlement_ref = Some(event.settlement_ref.clone());
                invoice.paid_at = Some(self.paid_at(&invoice));
                invoice.payer_identity = event.sender.clone();
                self.db.save_invoice(&invoice).await?;
                info!("🔄️ Invoice {} has been paid by settlement {}", invoice.id, event.settlement_ref);
                self.producers.publish_invoice_paid(InvoicePaidEvent::new(invoice.clone())).await;
                Ok(ReconcileOutcome::Matched(invoice))
            },
        }
    }

    /// The payment time can never precede the invoice's creation, even if this server's clock lags the one that
    /// issued the invoice.
    fn paid_at(&self, invoice: &Invoice) -> DateTime<Utc> {
        max(truncate_to_seconds(self.clock.now()), invoice.created_at)
    }

    async fn flag_for_review(
        &self,
        candidates: Vec<Invoice>,
        event: &ExternalPaymentEvent,
    ) -> Result<ReconcileOutcome, InvoiceApiError> {
        let mut ids = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let mut invoice = self.db.fetch_invoice(&candidate.id).await?.unwrap_or(candidate);
            if !invoice.is_pending() {
                debug!("🔄️ Invoice {} is {} now. It will not be flagged.", invoice.id, invoice.status);
                continue;
            }
            invoice.needs_review = true;
            if !invoice.review_refs.contains(&event.settlement_ref) {
                invoice.review_refs.push(event.settlement_ref.clone());
            }
            self.db.save_invoice(&invoice).await?;
            debug!("🔄️ Invoice {} flagged for review", invoice.id);
            ids.push(invoice.id.clone());
            let flagged = InvoiceFlaggedEvent::new(invoice, event.settlement_ref.clone());
            self.producers.publish_invoice_flagged(flagged).await;
        }
        Ok(ReconcileOutcome::AmbiguousFlaggedForReview(ids))
    }
}
