use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    db_types::{Account, Invoice, InvoiceId, InvoiceStatusType, MatchingKey, NewInvoice},
    events::{EventProducers, InvoiceAnnulledEvent},
    helpers::{truncate_to_seconds, Clock, SystemClock},
    traits::{InvoiceStore, InvoiceStoreError},
    wpe_api::{errors::InvoiceApiError, invoice_objects::InvoiceOptions},
};

/// Applies lazy expiry. If the invoice is still `Pending` and `now` is past its expiry time, a `Declined` copy is
/// returned; otherwise the invoice is returned unchanged. Nothing is persisted.
pub fn expire_if_due(invoice: &Invoice, now: DateTime<Utc>) -> Invoice {
    let mut result = invoice.clone();
    if invoice.is_expired_at(now) {
        result.status = InvoiceStatusType::Declined;
    }
    result
}

/// `InvoiceLifecycleApi` issues invoices and answers questions about their current state.
///
/// It owns the single-active-invoice policy: issuing a new invoice for a destination declines every invoice that is
/// still pending for that destination.
pub struct InvoiceLifecycleApi<B, C = SystemClock> {
    db: B,
    clock: C,
    options: InvoiceOptions,
    producers: EventProducers,
}

impl<B, C> Debug for InvoiceLifecycleApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InvoiceLifecycleApi ({:?})", self.options)
    }
}

impl<B> InvoiceLifecycleApi<B, SystemClock> {
    pub fn new(db: B, options: InvoiceOptions, producers: EventProducers) -> Self {
        Self::new_with_clock(db, SystemClock, options, producers)
    }
}

impl<B, C> InvoiceLifecycleApi<B, C> {
    pub fn new_with_clock(db: B, clock: C, options: InvoiceOptions, producers: EventProducers) -> Self {
        Self { db, clock, options, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn options(&self) -> &InvoiceOptions {
        &self.options
    }
}

impl<B, C> InvoiceLifecycleApi<B, C>
where
    B: InvoiceStore,
    C: Clock,
{
    /// Issues a new invoice.
    ///
    /// A fresh matching key is claimed in the store's index before anything else is written. On a collision a new key
    /// is generated, up to the configured number of attempts, after which the call fails with `Conflict`.
    ///
    /// Every invoice still pending for the same destination is then declined. This is best-effort: failures are
    /// logged and never prevent the new invoice from being issued.
    pub async fn create_invoice(&self, request: NewInvoice) -> Result<Invoice, InvoiceApiError> {
        self.options.validate()?;
        let ttl = match request.ttl_seconds {
            Some(secs) if secs <= 0 => {
                return Err(InvoiceApiError::InvalidInvoice(format!("The TTL must be positive. Got {secs}s")));
            },
            Some(secs) => Duration::try_seconds(secs)
                .ok_or_else(|| InvoiceApiError::InvalidInvoice(format!("A TTL of {secs}s is out of range")))?,
            None => self.options.default_ttl,
        };
        if let Some(amount) = request.expected_amount.filter(|a| a.is_negative()) {
            return Err(InvoiceApiError::InvalidInvoice(format!("The expected amount cannot be negative. Got {amount}")));
        }
        let created_at = truncate_to_seconds(self.clock.now());
        let expires_at = created_at
            .checked_add_signed(ttl)
            .ok_or_else(|| InvoiceApiError::InvalidInvoice(format!("A TTL of {}s is out of range", ttl.num_seconds())))?;
        let id = InvoiceId::random();
        let matching_key = self.claim_matching_key(&id, MatchingKey::random).await?;
        self.supersede_pending_invoices(&request.merchant_destination, &id).await;
        let invoice = Invoice {
            id,
            merchant_destination: request.merchant_destination,
            expected_amount: request.expected_amount,
            matching_key,
            status: InvoiceStatusType::Pending,
            needs_review: false,
            review_refs: Vec::new(),
            created_at,
            expires_at,
            paid_at: None,
            settlement_ref: None,
            payer_identity: None,
        };
        self.db.save_invoice(&invoice).await?;
        info!(
            "🧾️ Invoice {} issued for {} ({}), expiring at {expires_at}",
            invoice.id,
            invoice.merchant_destination,
            invoice.expected_amount.map(|a| a.to_string()).unwrap_or_else(|| "open amount".into()),
        );
        Ok(invoice)
    }

    /// Claims a key produced by `generate` for invoice `id`, retrying on collisions.
    pub(crate) async fn claim_matching_key<F>(&self, id: &InvoiceId, mut generate: F) -> Result<MatchingKey, InvoiceApiError>
    where F: FnMut() -> MatchingKey {
        let attempts = self.options.matching_key_attempts;
        for attempt in 1..=attempts {
            let key = generate();
            match self.db.index_matching_key(&key, id).await {
                Ok(()) => {
                    trace!("🧾️ Matching key {key} claimed for invoice {id}");
                    return Ok(key);
                },
                Err(InvoiceStoreError::MatchingKeyExists(_)) => {
                    warn!("🧾️ Matching key collision for invoice {id} (attempt {attempt} of {attempts})");
                },
                Err(e) => return Err(e.into()),
            }
        }
        error!("🧾️ Could not claim a unique matching key for invoice {id} after {attempts} attempts");
        Err(InvoiceApiError::Conflict(format!("Could not allocate a unique matching key after {attempts} attempts")))
    }

    async fn supersede_pending_invoices(&self, destination: &Account, superseded_by: &InvoiceId) {
        let pending = match self.db.fetch_pending_invoices(Some(destination)).await {
            Ok(pending) => pending,
            Err(e) => {
                error!("🧾️ Could not fetch pending invoices for {destination}, so none were superseded. {e}");
                return;
            },
        };
        for mut invoice in pending {
            invoice.status = InvoiceStatusType::Declined;
            match self.db.save_invoice(&invoice).await {
                Ok(()) => {
                    info!("🧾️ Invoice {} was superseded by {superseded_by} and is now declined", invoice.id);
                    let event = InvoiceAnnulledEvent::new(invoice, superseded_by.clone());
                    self.producers.publish_invoice_annulled(event).await;
                },
                Err(e) => error!("🧾️ Could not decline superseded invoice {}. {e}", invoice.id),
            }
        }
    }

    /// Fetches an invoice, with lazy expiry applied.
    pub async fn get_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, InvoiceApiError> {
        let invoice = self.db.fetch_invoice(id).await?;
        // Stored timestamps have whole-second precision
        let now = truncate_to_seconds(self.clock.now());
        Ok(invoice.map(|i| expire_if_due(&i, now)))
    }

    /// Lists invoices that are still awaiting payment, oldest first. Invoices that have logically expired are left out.
    pub async fn list_pending(&self, destination: Option<&Account>) -> Result<Vec<Invoice>, InvoiceApiError> {
        let now = truncate_to_seconds(self.clock.now());
        let pending = self.db.fetch_pending_invoices(destination).await?;
        Ok(pending.into_iter().filter(|i| !i.is_expired_at(now)).collect())
    }
}
