use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    InvoiceAnnulledEvent,
    InvoiceFlaggedEvent,
    InvoicePaidEvent,
};

/// The publishing ends of the installed hooks. Cheap to clone; every engine API holds a copy.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub invoice_paid_producer: Vec<EventProducer<InvoicePaidEvent>>,
    pub invoice_flagged_producer: Vec<EventProducer<InvoiceFlaggedEvent>>,
    pub invoice_annulled_producer: Vec<EventProducer<InvoiceAnnulledEvent>>,
}

impl EventProducers {
    pub async fn publish_invoice_paid(&self, event: InvoicePaidEvent) {
        for producer in &self.invoice_paid_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_invoice_flagged(&self, event: InvoiceFlaggedEvent) {
        for producer in &self.invoice_flagged_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_invoice_annulled(&self, event: InvoiceAnnulledEvent) {
        for producer in &self.invoice_annulled_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_invoice_paid: Option<EventHandler<InvoicePaidEvent>>,
    pub on_invoice_flagged: Option<EventHandler<InvoiceFlaggedEvent>>,
    pub on_invoice_annulled: Option<EventHandler<InvoiceAnnulledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_invoice_paid = hooks.on_invoice_paid.map(|f| EventHandler::new(buffer_size, f));
        let on_invoice_flagged = hooks.on_invoice_flagged.map(|f| EventHandler::new(buffer_size, f));
        let on_invoice_annulled = hooks.on_invoice_annulled.map(|f| EventHandler::new(buffer_size, f));
        Self { on_invoice_paid, on_invoice_flagged, on_invoice_annulled }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_invoice_paid {
            result.invoice_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_invoice_flagged {
            result.invoice_flagged_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_invoice_annulled {
            result.invoice_annulled_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task for every installed handler. Each one runs until the last producer subscribed to it is dropped.
    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_invoice_paid {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_invoice_flagged {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_invoice_annulled {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_invoice_paid: Option<Handler<InvoicePaidEvent>>,
    pub on_invoice_flagged: Option<Handler<InvoiceFlaggedEvent>>,
    pub on_invoice_annulled: Option<Handler<InvoiceAnnulledEvent>>,
}

impl EventHooks {
    pub fn on_invoice_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(InvoicePaidEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_invoice_paid = Some(Arc::new(f));
        self
    }

    pub fn on_invoice_flagged<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(InvoiceFlaggedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_invoice_flagged = Some(Arc::new(f));
        self
    }

    pub fn on_invoice_annulled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(InvoiceAnnulledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_invoice_annulled = Some(Arc::new(f));
        self
    }
}
