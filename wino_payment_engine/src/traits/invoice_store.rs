use log::*;
use thiserror::Error;

use crate::db_types::{Account, Invoice, InvoiceId, MatchingKey};

/// This trait defines the behaviour a storage backend must provide for the Wino Payment Engine.
///
/// The store is deliberately simple: atomic single-key reads and writes of invoice records, a secondary index from
/// matching key to invoice id, and a time-ordered scan of pending invoices. There are no multi-key transactions; the
/// engine's correctness relies on the monotone, idempotent `Paid` transition instead.
#[allow(async_fn_in_trait)]
pub trait InvoiceStore {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Fetches the invoice with the given id, as it is stored. No expiry logic is applied at this level.
    async fn fetch_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, InvoiceStoreError>;

    /// Writes the invoice record, overwriting any previous version with the same id.
    async fn save_invoice(&self, invoice: &Invoice) -> Result<(), InvoiceStoreError>;

    /// Claims `key` for the invoice `id` in the matching key index.
    ///
    /// Fails with [`InvoiceStoreError::MatchingKeyExists`] if the key has ever been claimed before. Keys are never
    /// released, so a key can never be reused.
    async fn index_matching_key(&self, key: &MatchingKey, id: &InvoiceId) -> Result<(), InvoiceStoreError>;

    /// Point lookup in the matching key index.
    async fn invoice_id_for_matching_key(&self, key: &MatchingKey) -> Result<Option<InvoiceId>, InvoiceStoreError>;

    /// Fetches every invoice whose *stored* status is `Pending`, optionally restricted to a single destination,
    /// ordered by `created_at` (oldest first).
    async fn fetch_pending_invoices(&self, destination: Option<&Account>) -> Result<Vec<Invoice>, InvoiceStoreError>;

    /// Resolves a matching key to its invoice record. A key whose invoice record is missing (the invoice insert failed
    /// after the key was claimed) resolves to `None`.
    async fn fetch_invoice_by_matching_key(&self, key: &MatchingKey) -> Result<Option<Invoice>, InvoiceStoreError> {
        let Some(id) = self.invoice_id_for_matching_key(key).await? else {
            return Ok(None);
        };
        let invoice = self.fetch_invoice(&id).await?;
        if invoice.is_none() {
            warn!("🗃️ Matching key {key} is claimed by invoice {id}, but that invoice does not exist.");
        }
        Ok(invoice)
    }

    async fn close(&mut self) -> Result<(), InvoiceStoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum InvoiceStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Matching key {0} has already been issued")]
    MatchingKeyExists(String),
    #[error("Invoice record {id} is corrupt: {reason}")]
    CorruptRecord { id: String, reason: String },
}

impl From<sqlx::Error> for InvoiceStoreError {
    fn from(e: sqlx::Error) -> Self {
        InvoiceStoreError::DatabaseError(e.to_string())
    }
}
