use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use wino_payment_engine::{
    db_types::{Account, ExternalPaymentEvent, MatchingKey},
    LedgerError,
    LedgerReader,
};

/// An in-memory ledger. Clones share the same transfers.
#[derive(Debug, Clone, Default)]
pub struct FakeLedger {
    transfers: Arc<Mutex<Vec<ExternalPaymentEvent>>>,
    offline: Arc<Mutex<bool>>,
}

impl FakeLedger {
    pub fn record(&self, transfer: ExternalPaymentEvent) {
        self.transfers.lock().unwrap().push(transfer);
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    fn check_online(&self) -> Result<(), LedgerError> {
        if *self.offline.lock().unwrap() {
            Err(LedgerError::Unavailable("the ledger is offline".into()))
        } else {
            Ok(())
        }
    }
}

impl LedgerReader for FakeLedger {
    async fn decode_recent_transfers(
        &self,
        destination: &Account,
        since: DateTime<Utc>,
    ) -> Result<Vec<ExternalPaymentEvent>, LedgerError> {
        self.check_online()?;
        let transfers = self.transfers.lock().unwrap();
        Ok(transfers.iter().filter(|t| &t.destination == destination && t.occurred_at >= since).cloned().collect())
    }

    async fn find_by_settlement_reference(&self, key: &MatchingKey) -> Result<Option<ExternalPaymentEvent>, LedgerError> {
        self.check_online()?;
        let transfers = self.transfers.lock().unwrap();
        Ok(transfers.iter().find(|t| t.references(key)).cloned())
    }

    async fn find_all_by_settlement_reference(
        &self,
        key: &MatchingKey,
    ) -> Result<Vec<ExternalPaymentEvent>, LedgerError> {
        self.check_online()?;
        let transfers = self.transfers.lock().unwrap();
        Ok(transfers.iter().filter(|t| t.references(key)).cloned().collect())
    }
}
