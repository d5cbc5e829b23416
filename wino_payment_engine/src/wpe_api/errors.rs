use thiserror::Error;

use crate::traits::{InvoiceStoreError, LedgerError};

#[derive(Debug, Clone, Error)]
pub enum InvoiceApiError {
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid invoice request: {0}")]
    InvalidInvoice(String),
    #[error("Invoice store error: {0}")]
    StoreError(#[from] InvoiceStoreError),
    #[error("Upstream ledger is unavailable: {0}")]
    UpstreamUnavailable(#[from] LedgerError),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}
