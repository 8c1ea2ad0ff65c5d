use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{MasterOrder, SubOrder},
    events::{EventProducers, OrderCreatedEvent},
    traits::{CartManagement, CartView, CheckoutRequest, FulfillmentDatabase, FulfillmentError, MarketConfig},
};

/// `CheckoutApi` is the order assembler: it turns a customer's cart into a master order with one sub-order per
/// merchant, and manages the cart that feeds it.
///
/// Marketplace policy (commission rate, pickup window) is injected here at construction time and travels with the
/// API instance; there is no process-wide configuration.
pub struct CheckoutApi<B> {
    db: B,
    config: MarketConfig,
    producers: EventProducers,
}

impl<B> Debug for CheckoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B> CheckoutApi<B> {
    pub fn new(db: B, config: MarketConfig, producers: EventProducers) -> Self {
        Self { db, config, producers }
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }
}

impl<B> CheckoutApi<B>
where B: FulfillmentDatabase + CartManagement
{
    /// Assembles the customer's cart into an order.
    ///
    /// Preconditions (non-empty cart, active products with sufficient stock, an active hub for cash-on-delivery) are
    /// checked inside the same transaction that creates the order rows, decrements stock and clears the cart, so a
    /// failure anywhere leaves no trace. For mobile-money orders the caller is expected to initiate the push payment
    /// *after* this returns; a failed initiation marks the order payment-failed but does not undo it.
    pub async fn checkout(
        &self,
        customer_id: i64,
        request: &CheckoutRequest,
    ) -> Result<(MasterOrder, Vec<SubOrder>), FulfillmentError> {
        request.validate().map_err(FulfillmentError::Validation)?;
        let (order, suborders) = self.db.checkout_cart(customer_id, request, &self.config).await?;
        debug!("🧾️ Order #{} created for customer #{customer_id}", order.id);
        self.call_order_created_hook(&order, &suborders).await;
        Ok((order, suborders))
    }

    pub async fn add_to_cart(
        &self,
        customer_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<CartView, FulfillmentError> {
        self.db.add_to_cart(customer_id, product_id, quantity).await
    }

    pub async fn remove_from_cart(&self, customer_id: i64, product_id: i64) -> Result<CartView, FulfillmentError> {
        self.db.remove_from_cart(customer_id, product_id).await
    }

    pub async fn fetch_cart(&self, customer_id: i64) -> Result<CartView, FulfillmentError> {
        self.db.fetch_cart(customer_id).await
    }

    async fn call_order_created_hook(&self, order: &MasterOrder, suborders: &[SubOrder]) {
        for emitter in &self.producers.order_created_producer {
            trace!("🧾️ Notifying order created hook subscribers");
            let event = OrderCreatedEvent { order: order.clone(), suborders: suborders.to_vec() };
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
