use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{Account, ExternalPaymentEvent, MatchingKey};

/// Read-only access to already-decoded transfers on the ledger.
///
/// Implementations do not retry; a failed call is reported as a [`LedgerError`] and the caller decides what to do.
#[allow(async_fn_in_trait)]
pub trait LedgerReader {
    /// Fetches the transfers into `destination` that occurred at or after `since`.
    async fn decode_recent_transfers(
        &self,
        destination: &Account,
        since: DateTime<Utc>,
    ) -> Result<Vec<ExternalPaymentEvent>, LedgerError>;

    /// Finds the transfer whose instruction references `key` as an auxiliary account, if there is one.
    async fn find_by_settlement_reference(&self, key: &MatchingKey)
        -> Result<Option<ExternalPaymentEvent>, LedgerError>;

    /// Finds every transfer that references `key`. A transaction with several transfers (a payment plus a fee, say)
    /// yields one event per transfer, all carrying the same references.
    async fn find_all_by_settlement_reference(
        &self,
        key: &MatchingKey,
    ) -> Result<Vec<ExternalPaymentEvent>, LedgerError> {
        Ok(self.find_by_settlement_reference(key).await?.into_iter().collect())
    }
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("The ledger is unavailable: {0}")]
    Unavailable(String),
    #[error("The ledger returned an invalid response: {0}")]
    InvalidResponse(String),
}
