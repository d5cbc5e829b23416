//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (database access, ledger lookups)
//! must be expressed as futures, so that async handlers get executed concurrently by the worker threads.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use wino_payment_engine::{
    db_types::{Account, InvoiceId, NewInvoice},
    IngestionApi,
    InvoiceLifecycleApi,
    InvoiceStore,
    LedgerReader,
};

use crate::{
    config::{ServerOptions, WebhookAuthConfig},
    data_objects::{NormalizedDelivery, PendingInvoicesQuery},
    errors::ServerError,
    helpers::{bearer_token, get_remote_ip},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Invoices  ----------------------------------------------------
route!(create_invoice => Post "/invoices" impl InvoiceStore);
/// Issues a new invoice for a merchant destination.
///
/// Any invoice still pending for the same destination is declined. The response contains the new invoice, including
/// the matching key the payer must reference in the transfer.
pub async fn create_invoice<B: InvoiceStore>(
    api: web::Data<InvoiceLifecycleApi<B>>,
    body: web::Json<NewInvoice>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ Invoice requested for {}", request.merchant_destination);
    let invoice = api.create_invoice(request).await?;
    info!("💻️ Issued invoice {} for {}", invoice.id, invoice.merchant_destination);
    Ok(HttpResponse::Ok().json(invoice))
}

route!(pending_invoices => Get "/invoices/pending" impl InvoiceStore);
pub async fn pending_invoices<B: InvoiceStore>(
    api: web::Data<InvoiceLifecycleApi<B>>,
    query: web::Query<PendingInvoicesQuery>,
) -> Result<HttpResponse, ServerError> {
    let destination = query
        .into_inner()
        .destination
        .map(|d| d.parse::<Account>())
        .transpose()
        .map_err(|e| ServerError::InvalidRequestPath(e.to_string()))?;
    let invoices = api.list_pending(destination.as_ref()).await?;
    trace!("💻️ {} pending invoices", invoices.len());
    Ok(HttpResponse::Ok().json(invoices))
}

route!(invoice_by_id => Get "/invoice/{id}" impl InvoiceStore);
pub async fn invoice_by_id<B: InvoiceStore>(
    api: web::Data<InvoiceLifecycleApi<B>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let id = InvoiceId::from(path.into_inner());
    let invoice = api.get_invoice(&id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Invoice {id}")))?;
    Ok(HttpResponse::Ok().json(invoice))
}

//----------------------------------------------   Confirmation  ----------------------------------------------------
route!(poll_invoice => Get "/invoice/{id}/poll" impl InvoiceStore, LedgerReader);
/// Reports the invoice's status, scanning recent transfers into its destination if it is still awaiting payment.
///
/// A ledger that cannot be reached in time, or a store failure, is reported as `Pending` rather than as an error.
pub async fn poll_invoice<B, L>(
    api: web::Data<IngestionApi<B, L>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError>
where
    B: InvoiceStore,
    L: LedgerReader,
{
    let id = InvoiceId::from(path.into_inner());
    trace!("💻️ Status poll for invoice {id}");
    let report = api.handle_poll(&id).await.ok_or_else(|| ServerError::NoRecordFound(format!("Invoice {id}")))?;
    Ok(HttpResponse::Ok().json(report))
}

route!(verify_invoice => Post "/invoice/{id}/verify" impl InvoiceStore, LedgerReader);
/// Looks the invoice's matching key up on the ledger, and settles the invoice if a referencing transfer exists.
pub async fn verify_invoice<B, L>(
    api: web::Data<IngestionApi<B, L>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError>
where
    B: InvoiceStore,
    L: LedgerReader,
{
    let id = InvoiceId::from(path.into_inner());
    trace!("💻️ Verification requested for invoice {id}");
    let report = api.handle_verify(&id).await.ok_or_else(|| ServerError::NoRecordFound(format!("Invoice {id}")))?;
    Ok(HttpResponse::Ok().json(report))
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(transfer_webhook => Post "/transfers" impl InvoiceStore, LedgerReader);
/// Receives transfers pushed by the indexer.
///
/// The indexer must present the shared secret as a bearer credential. The body is a single notification or an array
/// of them, in either the canonical event shape or the indexer's enhanced transaction shape. Every event is reconciled
/// independently; the response is always `200` with a summary once the body has been accepted, even if some events
/// failed, so that the indexer does not redeliver the whole batch.
pub async fn transfer_webhook<B, L>(
    req: HttpRequest,
    auth: web::Data<WebhookAuthConfig>,
    options: web::Data<ServerOptions>,
    api: web::Data<IngestionApi<B, L>>,
    body: web::Bytes,
) -> Result<HttpResponse, ServerError>
where
    B: InvoiceStore,
    L: LedgerReader,
{
    let peer = get_remote_ip(&req, options.use_x_forwarded_for);
    trace!("💻️ Transfer notification received from {peer:?}");
    let Some(secret) = auth.secret.as_ref().filter(|s| !s.is_empty()) else {
        error!("💻️ A transfer notification was received, but WPG_WEBHOOK_SECRET is not configured.");
        return Err(ServerError::ConfigurationError("The webhook secret is not configured".into()));
    };
    let authorized = bearer_token(&req).is_some_and(|token| secret.matches(token.as_bytes()));
    if !authorized {
        warn!("💻️ Rejected a transfer notification with missing or invalid credentials from {peer:?}");
        return Err(ServerError::Unauthorized);
    }
    let delivery = NormalizedDelivery::from_json(&body, options.payment_mint.as_deref(), options.token_decimals)
        .map_err(|e| {
            warn!("💻️ Could not parse transfer notification from {peer:?}. {e}");
            ServerError::InvalidRequestBody(e)
        })?;
    let NormalizedDelivery { events, rejected } = delivery;
    let mut report = api.handle_webhook(&events).await;
    for (reference, reason) in rejected {
        warn!("💻️ Skipped transfer notification {reference}. {reason}");
        report.record_rejected(&reference, reason);
    }
    info!(
        "💻️ Webhook processed {} events: {} matched, {} flagged, {} unmatched, {} failed",
        report.received,
        report.matched.len(),
        report.flagged_for_review.len(),
        report.unmatched.len(),
        report.failures.len()
    );
    Ok(HttpResponse::Ok().json(report))
}
