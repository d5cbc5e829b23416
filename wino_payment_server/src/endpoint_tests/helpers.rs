use std::time::Duration;

use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use log::debug;
use wino_payment_engine::{
    db_types::{Account, Invoice, MatchingKey, NewInvoice},
    events::EventProducers,
    invoice_objects::{InvoiceOptions, MatchRules},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    IngestionApi,
    InvoiceLifecycleApi,
    LedgerReader,
    ReconciliationApi,
    SqliteDatabase,
};
use wpg_common::TokenAmount;

use crate::{
    config::{ServerOptions, WebhookAuthConfig},
    routes::{
        health,
        CreateInvoiceRoute,
        InvoiceByIdRoute,
        PendingInvoicesRoute,
        PollInvoiceRoute,
        TransferWebhookRoute,
        VerifyInvoiceRoute,
    },
};

pub const WEBHOOK_SECRET: &str = "correct-horse-battery-staple";

pub async fn test_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to test database")
}

pub fn random_account() -> Account {
    MatchingKey::random().to_account()
}

/// Registers every route against `db` and `ledger`, the way the server does.
pub fn configure_app<L>(
    db: SqliteDatabase,
    ledger: L,
    webhook_secret: Option<&str>,
    poll_budget: Duration,
) -> impl FnOnce(&mut ServiceConfig)
where
    L: LedgerReader + 'static,
{
    let webhook_auth = webhook_secret.map(WebhookAuthConfig::new).unwrap_or_default();
    move |cfg: &mut ServiceConfig| {
        let producers = EventProducers::default();
        let lifecycle_api = InvoiceLifecycleApi::new(db.clone(), InvoiceOptions::default(), producers.clone());
        let reconciler = ReconciliationApi::new(db, MatchRules::default(), producers);
        let ingestion_api = IngestionApi::new(reconciler, ledger).with_poll_budget(poll_budget);
        cfg.service(health)
            .service(
                web::scope("/api")
                    .service(CreateInvoiceRoute::<SqliteDatabase>::new())
                    .service(PendingInvoicesRoute::<SqliteDatabase>::new())
                    .service(PollInvoiceRoute::<SqliteDatabase, L>::new())
                    .service(VerifyInvoiceRoute::<SqliteDatabase, L>::new())
                    .service(InvoiceByIdRoute::<SqliteDatabase>::new()),
            )
            .service(web::scope("/webhook").service(TransferWebhookRoute::<SqliteDatabase, L>::new()))
            .app_data(web::Data::new(lifecycle_api))
            .app_data(web::Data::new(ingestion_api))
            .app_data(web::Data::new(webhook_auth))
            .app_data(web::Data::new(ServerOptions::default()));
    }
}

pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = test::read_body(res).await;
    (status, String::from_utf8_lossy(&body).into_owned())
}

/// Issues an invoice directly through the engine.
pub async fn issue_invoice(db: &SqliteDatabase, destination: &Account, amount: i64) -> Invoice {
    let api = InvoiceLifecycleApi::new(db.clone(), InvoiceOptions::default(), EventProducers::default());
    let request = NewInvoice::new(destination.clone()).with_amount(TokenAmount::from(amount));
    api.create_invoice(request).await.expect("Error issuing invoice")
}
