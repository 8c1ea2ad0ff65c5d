use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    HubRejectedEvent,
    OrderCancelledEvent,
    OrderCreatedEvent,
    PaymentConfirmedEvent,
    StatusChangedEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_created_producer: Vec<EventProducer<OrderCreatedEvent>>,
    pub payment_confirmed_producer: Vec<EventProducer<PaymentConfirmedEvent>>,
    pub status_changed_producer: Vec<EventProducer<StatusChangedEvent>>,
    pub order_cancelled_producer: Vec<EventProducer<OrderCancelledEvent>>,
    pub hub_rejected_producer: Vec<EventProducer<HubRejectedEvent>>,
}

pub struct EventHandlers {
    pub on_order_created: Option<EventHandler<OrderCreatedEvent>>,
    pub on_payment_confirmed: Option<EventHandler<PaymentConfirmedEvent>>,
    pub on_status_changed: Option<EventHandler<StatusChangedEvent>>,
    pub on_order_cancelled: Option<EventHandler<OrderCancelledEvent>>,
    pub on_hub_rejected: Option<EventHandler<HubRejectedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_created = hooks.on_order_created.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_confirmed = hooks.on_payment_confirmed.map(|f| EventHandler::new(buffer_size, f));
        let on_status_changed = hooks.on_status_changed.map(|f| EventHandler::new(buffer_size, f));
        let on_order_cancelled = hooks.on_order_cancelled.map(|f| EventHandler::new(buffer_size, f));
        let on_hub_rejected = hooks.on_hub_rejected.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_created, on_payment_confirmed, on_status_changed, on_order_cancelled, on_hub_rejected }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_created {
            result.order_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_confirmed {
            result.payment_confirmed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_status_changed {
            result.status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_cancelled {
            result.order_cancelled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_hub_rejected {
            result.hub_rejected_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_created {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_payment_confirmed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_status_changed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_order_cancelled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_hub_rejected {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_created: Option<Handler<OrderCreatedEvent>>,
    pub on_payment_confirmed: Option<Handler<PaymentConfirmedEvent>>,
    pub on_status_changed: Option<Handler<StatusChangedEvent>>,
    pub on_order_cancelled: Option<Handler<OrderCancelledEvent>>,
    pub on_hub_rejected: Option<Handler<HubRejectedEvent>>,
}

impl EventHooks {
    pub fn on_order_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_created = Some(Arc::new(f));
        self
    }

    pub fn on_payment_confirmed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentConfirmedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_confirmed = Some(Arc::new(f));
        self
    }

    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(StatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_order_cancelled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCancelledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_cancelled = Some(Arc::new(f));
        self
    }

    pub fn on_hub_rejected<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(HubRejectedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_hub_rejected = Some(Arc::new(f));
        self
    }
}
