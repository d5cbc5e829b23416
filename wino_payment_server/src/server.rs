use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use wino_payment_engine::{
    events::EventProducers,
    IngestionApi,
    InvoiceLifecycleApi,
    InvoiceStore,
    LedgerReader,
    ReconciliationApi,
    SqliteDatabase,
};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::{indexer::IndexerLedger, notifications::create_notification_event_handlers},
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

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    config.invoice_options.validate().map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
    let db = SqliteDatabase::create_and_migrate(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let ledger = IndexerLedger::new(config.indexer.clone(), config.payment_mint.clone(), config.token_decimals)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_notification_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    info!("📬️ Event handlers started");
    let srv = create_server_instance(config, db, ledger, producers)?;
    Ok(srv.await?)
}

pub fn create_server_instance<B, L>(
    config: ServerConfig,
    db: B,
    ledger: L,
    producers: EventProducers,
) -> Result<Server, ServerError>
where
    B: InvoiceStore + Clone + Send + 'static,
    L: LedgerReader + Clone + Send + 'static,
{
    let options = ServerOptions::from_config(&config);
    let webhook_auth = config.webhook.clone();
    let invoice_options = config.invoice_options;
    let match_rules = config.match_rules;
    let poll_budget = config.poll_budget;
    let srv = HttpServer::new(move || {
        let lifecycle_api = InvoiceLifecycleApi::new(db.clone(), invoice_options, producers.clone());
        let reconciler = ReconciliationApi::new(db.clone(), match_rules, producers.clone());
        let ingestion_api = IngestionApi::new(reconciler, ledger.clone()).with_poll_budget(poll_budget);
        let api_scope = web::scope("/api")
            .service(CreateInvoiceRoute::<B>::new())
            .service(PendingInvoicesRoute::<B>::new())
            .service(PollInvoiceRoute::<B, L>::new())
            .service(VerifyInvoiceRoute::<B, L>::new())
            .service(InvoiceByIdRoute::<B>::new());
        let webhook_scope = web::scope("/webhook").service(TransferWebhookRoute::<B, L>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("wpg::access_log"))
            .app_data(web::Data::new(lifecycle_api))
            .app_data(web::Data::new(ingestion_api))
            .app_data(web::Data::new(webhook_auth.clone()))
            .app_data(web::Data::new(options.clone()))
            .service(health)
            .service(api_scope)
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
