//! # Interface contracts of the engine's external collaborators.
//!
//! * [`InvoiceStore`] is the durable invoice store. It is the only shared state in the system, and therefore the sole
//!   serialization point between concurrent ingestion channels.
//! * [`LedgerReader`] gives read-only access to decoded transfers on the ledger. The engine never submits
//!   transactions.
mod invoice_store;
mod ledger_reader;

pub use invoice_store::{InvoiceStore, InvoiceStoreError};
pub use ledger_reader::{LedgerError, LedgerReader};
