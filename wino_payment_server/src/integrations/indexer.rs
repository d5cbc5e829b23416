//! Glue between the indexer's enhanced transactions and the engine's [`ExternalPaymentEvent`]s.
//!
//! The same conversion serves the webhook (the indexer pushes enhanced transactions) and the [`IndexerLedger`], which
//! implements [`LedgerReader`] on top of the indexer REST API for the poll and verify channels.
use chrono::{DateTime, Utc};
use indexer_tools::{EnhancedTransaction, IndexerApi, IndexerApiError, IndexerConfig, TokenTransfer};
use log::*;
use thiserror::Error;
use wino_payment_engine::{
    db_types::{Account, ExternalPaymentEvent, MatchingKey},
    LedgerError,
    LedgerReader,
};

#[derive(Debug, Clone, Error)]
pub enum TransferConversionError {
    #[error("Transaction {0} has no block time")]
    MissingTimestamp(String),
    #[error("A transfer in transaction {0} has no destination account")]
    MissingDestination(String),
    #[error("Transaction {signature} contains an invalid transfer. {reason}")]
    InvalidTransfer { signature: String, reason: String },
}

/// Converts every token transfer in `tx` into a payment event. If `mint` is given, transfers of other tokens are
/// skipped.
///
/// All the accounts the transaction touched become the events' referenced accounts, so that a matching key passed as
/// an auxiliary account of the transfer instruction is found. Every transfer of the transaction carries the same
/// references; the engine only lets a reference settle an invoice through the transfer into the invoice's destination.
/// When a transaction holds more than one qualifying transfer, the settlement reference of each is suffixed with its
/// position to keep them distinct.
pub fn events_from_enhanced_transaction(
    tx: &EnhancedTransaction,
    mint: Option<&str>,
    decimals: u8,
) -> Result<Vec<ExternalPaymentEvent>, TransferConversionError> {
    let transfers = tx.token_transfers.iter().filter(|t| mint.map_or(true, |m| t.is_for_mint(m))).collect::<Vec<_>>();
    if transfers.is_empty() {
        trace!("🛰️ Transaction {} has no relevant token transfers", tx.signature);
        return Ok(Vec::new());
    }
    let occurred_at = tx.block_time().ok_or_else(|| TransferConversionError::MissingTimestamp(tx.signature.clone()))?;
    let referenced = tx.touched_accounts().filter_map(|a| a.parse::<Account>().ok()).collect::<Vec<_>>();
    let multiple = transfers.len() > 1;
    transfers
        .into_iter()
        .enumerate()
        .map(|(i, transfer)| {
            let settlement_ref = if multiple { format!("{}:{i}", tx.signature) } else { tx.signature.clone() };
            let mut event = event_from_transfer(&tx.signature, settlement_ref, transfer, occurred_at, decimals)?;
            event.referenced_accounts = referenced.clone();
            Ok(event)
        })
        .collect()
}

fn event_from_transfer(
    signature: &str,
    settlement_ref: String,
    transfer: &TokenTransfer,
    occurred_at: DateTime<Utc>,
    decimals: u8,
) -> Result<ExternalPaymentEvent, TransferConversionError> {
    let invalid = |reason: String| TransferConversionError::InvalidTransfer { signature: signature.to_string(), reason };
    let destination = transfer
        .destination()
        .ok_or_else(|| TransferConversionError::MissingDestination(signature.to_string()))?
        .parse::<Account>()
        .map_err(|e| invalid(e.to_string()))?;
    let amount = transfer.token_amount.to_token_amount(decimals).map_err(|e| invalid(e.to_string()))?;
    let mut event = ExternalPaymentEvent::new(settlement_ref, destination, amount, occurred_at);
    if let Some(sender) = transfer.from_user_account.as_deref().and_then(|s| s.parse::<Account>().ok()) {
        event = event.with_sender(sender);
    }
    Ok(event)
}

//-------------------------------------------------  IndexerLedger  ----------------------------------------------------
/// A [`LedgerReader`] backed by the indexer REST API.
#[derive(Clone)]
pub struct IndexerLedger {
    api: IndexerApi,
    mint: Option<String>,
    decimals: u8,
}

impl IndexerLedger {
    pub fn new(config: IndexerConfig, mint: Option<String>, decimals: u8) -> Result<Self, IndexerApiError> {
        let api = IndexerApi::new(config)?;
        Ok(Self { api, mint, decimals })
    }

    fn decode(&self, txs: &[EnhancedTransaction]) -> Vec<ExternalPaymentEvent> {
        txs.iter()
            .flat_map(|tx| {
                events_from_enhanced_transaction(tx, self.mint.as_deref(), self.decimals).unwrap_or_else(|e| {
                    warn!("🛰️ Skipping transaction {}. {e}", tx.signature);
                    Vec::new()
                })
            })
            .collect()
    }
}

impl LedgerReader for IndexerLedger {
    async fn decode_recent_transfers(
        &self,
        destination: &Account,
        since: DateTime<Utc>,
    ) -> Result<Vec<ExternalPaymentEvent>, LedgerError> {
        let txs = self.api.transactions_since(destination.as_str(), since.timestamp()).await.map_err(ledger_error)?;
        let events = self
            .decode(&txs)
            .into_iter()
            .filter(|e| &e.destination == destination && e.occurred_at >= since)
            .collect::<Vec<_>>();
        debug!("🛰️ {} transfers into {destination} since {since}", events.len());
        Ok(events)
    }

    async fn find_by_settlement_reference(
        &self,
        key: &MatchingKey,
    ) -> Result<Option<ExternalPaymentEvent>, LedgerError> {
        Ok(self.find_all_by_settlement_reference(key).await?.into_iter().next())
    }

    async fn find_all_by_settlement_reference(
        &self,
        key: &MatchingKey,
    ) -> Result<Vec<ExternalPaymentEvent>, LedgerError> {
        // The key is an account of the transfer instruction, so the indexer lists the transaction under it
        let txs = self.api.address_transactions(key.as_str(), None).await.map_err(ledger_error)?;
        let found = referencing(self.decode(&txs), key);
        debug!("🛰️ {} transfers reference matching key {key}", found.len());
        Ok(found)
    }
}

fn referencing(events: Vec<ExternalPaymentEvent>, key: &MatchingKey) -> Vec<ExternalPaymentEvent> {
    events.into_iter().filter(|e| e.references(key)).collect()
}

fn ledger_error(e: IndexerApiError) -> LedgerError {
    match e {
        IndexerApiError::JsonError(s) => LedgerError::InvalidResponse(s),
        IndexerApiError::InvalidTokenAmount(s) => LedgerError::InvalidResponse(s),
        IndexerApiError::QueryError { status, message } if status < 500 => {
            LedgerError::InvalidResponse(format!("Indexer rejected the query ({status}). {message}"))
        },
        e => LedgerError::Unavailable(e.to_string()),
    }
}
