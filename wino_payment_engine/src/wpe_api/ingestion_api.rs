use std::{fmt::Debug, time::Duration as StdDuration};

use log::*;

use crate::{
    db_types::{ExternalPaymentEvent, Invoice, InvoiceId},
    helpers::{truncate_to_seconds, Clock, SystemClock},
    traits::{InvoiceStore, LedgerReader},
    wpe_api::{
        errors::InvoiceApiError,
        invoice_objects::{BatchReport, InvoiceStatusReport, DEFAULT_POLL_BUDGET_MS},
        lifecycle_api::expire_if_due,
        reconciliation_api::ReconciliationApi,
    },
};

/// `IngestionApi` adapts the three payment confirmation channels to the reconciliation engine.
///
/// * Webhook: pushed events are reconciled as a batch.
/// * Poll: the ledger is asked for recent transfers into the invoice's destination, within a hard time budget.
/// * Verify: the ledger is asked for the transfers that reference the invoice's matching key.
///
/// Poll and verify never fail because of the ledger or the store: if the state cannot be determined, the invoice is
/// reported as `Pending`. `None` means the invoice does not exist.
pub struct IngestionApi<B, L, C = SystemClock> {
    reconciler: ReconciliationApi<B, C>,
    ledger: L,
    poll_budget: StdDuration,
}

impl<B, L, C> Debug for IngestionApi<B, L, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IngestionApi (poll budget: {:?})", self.poll_budget)
    }
}

impl<B, L, C> IngestionApi<B, L, C> {
    pub fn new(reconciler: ReconciliationApi<B, C>, ledger: L) -> Self {
        Self { reconciler, ledger, poll_budget: StdDuration::from_millis(DEFAULT_POLL_BUDGET_MS) }
    }

    pub fn with_poll_budget(mut self, budget: StdDuration) -> Self {
        self.poll_budget = budget;
        self
    }

    pub fn reconciler(&self) -> &ReconciliationApi<B, C> {
        &self.reconciler
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }
}

impl<B, L, C> IngestionApi<B, L, C>
where
    B: InvoiceStore,
    L: LedgerReader,
    C: Clock,
{
    /// Reconciles events pushed by the indexer. Each event is handled independently.
    pub async fn handle_webhook(&self, events: &[ExternalPaymentEvent]) -> BatchReport {
        info!("📥️ Webhook delivered {} payment events", events.len());
        self.reconciler.reconcile_batch(events).await
    }

    /// Answers a client's status poll, consulting the ledger if the invoice is still awaiting payment.
    pub async fn handle_poll(&self, id: &InvoiceId) -> Option<InvoiceStatusReport> {
        let invoice = match self.reconciler.db().fetch_invoice(id).await {
            Ok(Some(invoice)) => invoice,
            Ok(None) => return None,
            Err(e) => {
                warn!("📥️ Could not fetch invoice {id} for a status poll. Reporting it as pending. {e}");
                return Some(InvoiceStatusReport::unknown(id.clone()));
            },
        };
        if invoice.status.is_terminal() {
            return Some(InvoiceStatusReport::from(&invoice));
        }
        let now = truncate_to_seconds(self.reconciler.clock().now());
        if invoice.is_expired_at(now) {
            trace!("📥️ Invoice {id} has expired. Reporting it as declined.");
            return Some(InvoiceStatusReport::from(&expire_if_due(&invoice, now)));
        }
        let since = invoice.created_at - self.reconciler.rules().clock_skew_guard;
        let fetch = self.ledger.decode_recent_transfers(&invoice.merchant_destination, since);
        let transfers = match tokio::time::timeout(self.poll_budget, fetch).await {
            Ok(Ok(transfers)) => transfers,
            Ok(Err(e)) => {
                warn!("📥️ Ledger lookup for invoice {id} failed. Reporting it as pending. {e}");
                return Some(InvoiceStatusReport::from(&invoice));
            },
            Err(_) => {
                let budget = self.poll_budget;
                warn!("📥️ Ledger lookup for invoice {id} exceeded the {budget:?} budget. Reporting it as pending.");
                return Some(InvoiceStatusReport::from(&invoice));
            },
        };
        trace!("📥️ {} recent transfers into {} for invoice {id}", transfers.len(), invoice.merchant_destination);
        let updated = match self.reconcile_against(&transfers, &invoice).await {
            Ok(resolved) => resolved.unwrap_or(invoice),
            Err(e) => {
                warn!("📥️ Could not reconcile transfers against invoice {id}. Reporting it as pending. {e}");
                invoice
            },
        };
        Some(InvoiceStatusReport::from(&updated))
    }

    /// Reconciles each transfer against `invoice` until one resolves it. `None` means no transfer corresponds to the
    /// invoice.
    async fn reconcile_against(
        &self,
        transfers: &[ExternalPaymentEvent],
        invoice: &Invoice,
    ) -> Result<Option<Invoice>, InvoiceApiError> {
        for transfer in transfers {
            let outcome = self.reconciler.reconcile_for_invoice(transfer, invoice).await?;
            if let Some(resolved) = outcome.invoice() {
                debug!("📥️ Invoice {}: {outcome}", invoice.id);
                return Ok(Some(resolved.clone()));
            }
        }
        Ok(None)
    }

    /// Asks the ledger directly for the transfers that reference the invoice's matching key. Only a transfer into the
    /// invoice's destination settles it.
    ///
    /// Unlike a poll, no local expiry is applied: if the ledger has nothing, the stored status is reported as is. An
    /// expired invoice may still be settled here, since a referenced transfer is authoritative.
    pub async fn handle_verify(&self, id: &InvoiceId) -> Option<InvoiceStatusReport> {
        let invoice = match self.reconciler.db().fetch_invoice(id).await {
            Ok(Some(invoice)) => invoice,
            Ok(None) => return None,
            Err(e) => {
                warn!("📥️ Could not fetch invoice {id} for verification. Reporting it as pending. {e}");
                return Some(InvoiceStatusReport::unknown(id.clone()));
            },
        };
        if invoice.is_paid() {
            return Some(InvoiceStatusReport::from(&invoice));
        }
        let transfers = match self.ledger.find_all_by_settlement_reference(&invoice.matching_key).await {
            Ok(transfers) if transfers.is_empty() => {
                debug!("📥️ The ledger has no transfer referencing invoice {id}");
                return Some(InvoiceStatusReport::from(&invoice));
            },
            Ok(transfers) => transfers,
            Err(e) => {
                warn!("📥️ Ledger lookup for invoice {id} failed. Reporting the stored status. {e}");
                return Some(InvoiceStatusReport::from(&invoice));
            },
        };
        let report = match self.reconcile_against(&transfers, &invoice).await {
            Ok(Some(updated)) => InvoiceStatusReport::from(&updated),
            Ok(None) => {
                let refs = transfers.iter().map(|t| t.settlement_ref.as_str()).collect::<Vec<_>>().join(", ");
                warn!(
                    "📥️ The ledger returned settlements [{refs}] for invoice {id}, but none of them pays into {}",
                    invoice.merchant_destination
                );
                InvoiceStatusReport::from(&invoice)
            },
            Err(e) => {
                warn!("📥️ Could not reconcile the referenced settlements against invoice {id}. {e}");
                InvoiceStatusReport::from(&invoice)
            },
        };
        Some(report)
    }
}
