use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use cucumber::World;
use log::*;
use wino_payment_engine::{
    db_types::{Account, ExternalPaymentEvent, Invoice, MatchingKey},
    helpers::ManualClock,
    invoice_objects::{InvoiceOptions, InvoiceStatusReport, MatchRules, ReconcileOutcome},
    IngestionApi,
    InvoiceApiError,
    InvoiceLifecycleApi,
    ReconciliationApi,
    SqliteDatabase,
};

use crate::cucumber::FakeLedger;

pub const T0: i64 = 1_700_000_000;

#[derive(Default, Debug, World)]
pub struct InvoiceWorld {
    pub system: Option<ReconciliationSystem>,
    /// Merchant aliases used in feature files, mapped to their destination accounts
    pub merchants: HashMap<String, Account>,
    /// Invoice aliases used in feature files
    pub invoices: HashMap<String, Invoice>,
    /// Transfers by settlement reference, so that they can be redelivered
    pub transfers: HashMap<String, ExternalPaymentEvent>,
    pub last_outcome: Option<Result<ReconcileOutcome, InvoiceApiError>>,
    pub last_report: Option<InvoiceStatusReport>,
    pub last_error: Option<InvoiceApiError>,
}

#[derive(Debug)]
pub struct ReconciliationSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub clock: ManualClock,
    pub ledger: FakeLedger,
    pub lifecycle: InvoiceLifecycleApi<SqliteDatabase, ManualClock>,
    pub ingestion: IngestionApi<SqliteDatabase, FakeLedger, ManualClock>,
}

impl ReconciliationSystem {
    pub async fn new() -> Self {
        let db_path = random_db_path();
        let db = SqliteDatabase::create_and_migrate(&db_path, 1).await.expect("Error creating database");
        debug!("🚀️ Created database: {db_path}");
        let clock = ManualClock::new(t0());
        let ledger = FakeLedger::default();
        let lifecycle =
            InvoiceLifecycleApi::new_with_clock(db.clone(), clock.clone(), InvoiceOptions::default(), Default::default());
        let reconciler =
            ReconciliationApi::new_with_clock(db.clone(), clock.clone(), MatchRules::default(), Default::default());
        let ingestion = IngestionApi::new(reconciler, ledger.clone());
        Self { db_path, db, clock, ledger, lifecycle, ingestion }
    }
}

impl InvoiceWorld {
    pub fn system(&self) -> &ReconciliationSystem {
        self.system.as_ref().expect("The system has not been initialised")
    }

    pub fn merchant(&mut self, alias: &str) -> Account {
        self.merchants.entry(alias.to_string()).or_insert_with(|| MatchingKey::random().to_account()).clone()
    }

    pub fn invoice(&self, alias: &str) -> &Invoice {
        self.invoices.get(alias).unwrap_or_else(|| panic!("Invoice {alias} has not been issued"))
    }

    pub fn now(&self) -> DateTime<Utc> {
        use wino_payment_engine::helpers::Clock;
        self.system().clock.now()
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(T0, 0).unwrap()
}

fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/wpg_cucumber_{}.db", dir.display(), rand::random::<u64>())
}
