use futures::future::BoxFuture;
use log::*;
use wino_payment_engine::events::{
    EventHandlers,
    EventHooks,
    InvoiceAnnulledEvent,
    InvoiceFlaggedEvent,
    InvoicePaidEvent,
};

pub const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 25;

/// Installs the server's own event hooks, which write engine events to the log.
///
/// 1. InvoicePaidEvent - info, with the settlement reference and payer.
/// 2. InvoiceFlaggedEvent - a warning, since an operator has to resolve the ambiguity by hand.
/// 3. InvoiceAnnulledEvent - info. If a payment for the superseded invoice arrives later, it must be refunded.
pub fn create_notification_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_invoice_paid(|ev| {
        let InvoicePaidEvent { invoice } = ev;
        Box::pin(async move {
            info!(
                "📬️ Invoice {} was paid by settlement {}. Payer: {}",
                invoice.id,
                invoice.settlement_ref.as_deref().unwrap_or("unknown"),
                invoice.payer_identity.as_ref().map(|a| a.to_string()).unwrap_or_else(|| "unknown".into())
            );
        }) as BoxFuture<'static, ()>
    });
    hooks.on_invoice_flagged(|ev| {
        let InvoiceFlaggedEvent { invoice, settlement_ref } = ev;
        Box::pin(async move {
            warn!(
                "📬️ Settlement {settlement_ref} could match invoice {} among others. The invoice needs a manual review.",
                invoice.id
            );
        }) as BoxFuture<'static, ()>
    });
    hooks.on_invoice_annulled(|ev| {
        let InvoiceAnnulledEvent { invoice, superseded_by } = ev;
        Box::pin(async move {
            info!(
                "📬️ Invoice {} for {} was superseded by invoice {superseded_by}",
                invoice.id, invoice.merchant_destination
            );
        }) as BoxFuture<'static, ()>
    });
    EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks)
}
