//! Wino Payment Engine
//!
//! The Wino Payment Engine decides, reliably and exactly once, when a merchant invoice has been paid on an external
//! token ledger. It is provider-agnostic: payment confirmations reach it through any number of channels (an indexer
//! webhook, client polling, or a direct ledger lookup) and are funnelled through a single reconciliation engine.
//!
//! The library is divided into the following sections:
//! 1. Storage ([`mod@traits`] and the SQLite backend). Backends implement [`InvoiceStore`]. The data types that are
//!    persisted are defined in [`mod@db_types`] and are public.
//! 2. The engine public API:
//!    * [`InvoiceLifecycleApi`] creates invoices, enforces a single active invoice per destination and applies lazy
//!      expiry.
//!    * [`ReconciliationApi`] maps external payment events onto invoices and performs the idempotent `Paid`
//!      transition.
//!    * [`IngestionApi`] adapts the poll and verify channels, which consult a [`LedgerReader`], to the engine.
//!
//! The engine also publishes events (an invoice was paid, flagged for review or superseded) that can be subscribed to
//! via the hooks in [`mod@events`].
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;
mod wpe_api;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{InvoiceStore, InvoiceStoreError, LedgerError, LedgerReader};
pub use wpe_api::{
    errors::InvoiceApiError,
    ingestion_api::IngestionApi,
    invoice_objects,
    lifecycle_api::{expire_if_due, InvoiceLifecycleApi},
    matching::{fallback_candidates, is_fallback_candidate, match_by_fallback, match_by_reference},
    reconciliation_api::ReconciliationApi,
};
