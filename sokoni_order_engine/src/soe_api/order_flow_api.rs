use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{MasterOrder, Refund, RefundStatus, SubOrder, SubOrderStatus},
    events::{
        EventProducers,
        HubRejectedEvent,
        OrderCancelledEvent,
        PaymentConfirmedEvent,
        StatusChangedEvent,
    },
    soe_api::order_objects::{OrderDetail, SubOrderDetail},
    traits::{
        CallbackResolution,
        CancellationOutcome,
        ExpiryResult,
        FulfillmentDatabase,
        FulfillmentError,
        PaymentCallback,
    },
    transitions::ActorClass,
};

/// `OrderFlowApi` drives every status change an order goes through after checkout: payment reconciliation from
/// gateway callbacks, merchant shipping updates, the hub pickup workflow, customer cancellation with refunds, and
/// the pickup-deadline expiry sweep.
///
/// Scope rules are enforced here: merchants may only touch their own sub-orders, hub staff only sub-orders routed to
/// their hub, customers only their own orders. The transition table itself is enforced one layer down, on the
/// database write.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: FulfillmentDatabase
{
    //----------------------------------------  Payment reconciliation  ----------------------------------------------

    /// Applies an inbound payment callback to whichever order its correlation id matches.
    ///
    /// The call is idempotent and never errors on duplicates, unknown correlation ids, or callbacks that lost a race
    /// against cancellation — those all resolve to acknowledged no-ops, because the gateway must never be told to
    /// retry. Only a successful *first* application transitions the sub-orders and fires the payment-confirmed hook.
    pub async fn process_payment_callback(
        &self,
        callback: &PaymentCallback,
    ) -> Result<CallbackResolution, FulfillmentError> {
        let resolution = self.db.apply_payment_callback(callback).await?;
        match &resolution {
            CallbackResolution::PaymentApplied { order, suborders } => {
                info!("🔄️💰️ Payment confirmed for order #{}. {} sub-orders now awaiting shipment", order.id, suborders.len());
                self.call_payment_confirmed_hook(order, suborders).await;
            },
            CallbackResolution::PaymentFailed { order } => {
                info!("🔄️💰️ Payment failed for order #{}. Sub-orders stay pending so the customer can retry", order.id);
            },
            CallbackResolution::DuplicateSuccess { order_id } => {
                debug!("🔄️💰️ Duplicate success callback for order #{order_id}. Acknowledged, nothing to do");
            },
            CallbackResolution::SupersededByCancellation { order_id } => {
                info!("🔄️💰️ Success callback for order #{order_id} arrived after cancellation. The order stays cancelled");
            },
            CallbackResolution::Ignored { order_id } => {
                debug!("🔄️💰️ Failure callback for order #{order_id} ignored; the order is not pending payment");
            },
            CallbackResolution::Unmatched { correlation_id } => {
                warn!("🔄️💰️ No order matches payment correlation id [{correlation_id}]. Acknowledged without mutation");
            },
        }
        Ok(resolution)
    }

    /// Stores the gateway correlation id on the order after a push payment was initiated.
    pub async fn record_payment_request(
        &self,
        order_id: i64,
        correlation_id: &str,
    ) -> Result<MasterOrder, FulfillmentError> {
        self.db.record_payment_request(order_id, correlation_id).await
    }

    /// Marks the order payment-failed after push-payment initiation failed. The order is kept so the customer can
    /// retry; this is deliberately different from checkout failures, which leave nothing behind.
    pub async fn record_payment_initiation_failure(&self, order_id: i64) -> Result<MasterOrder, FulfillmentError> {
        self.db.record_payment_initiation_failure(order_id).await
    }

    //----------------------------------------      Customer queries    ----------------------------------------------

    pub async fn orders_for_customer(&self, customer_id: i64) -> Result<Vec<OrderDetail>, FulfillmentError> {
        let orders = self.db.fetch_orders_for_customer(customer_id).await?;
        let mut result = Vec::with_capacity(orders.len());
        for order in orders {
            result.push(self.order_detail(order).await?);
        }
        Ok(result)
    }

    pub async fn order_for_customer(&self, customer_id: i64, order_id: i64) -> Result<OrderDetail, FulfillmentError> {
        let order =
            self.db.fetch_master_order(order_id).await?.ok_or(FulfillmentError::OrderNotFound(order_id))?;
        if order.customer_id != customer_id {
            return Err(FulfillmentError::Forbidden("You can only view your own orders".to_string()));
        }
        self.order_detail(order).await
    }

    async fn order_detail(&self, order: MasterOrder) -> Result<OrderDetail, FulfillmentError> {
        let suborders = self.db.fetch_suborders_for_order(order.id).await?;
        let mut details = Vec::with_capacity(suborders.len());
        for suborder in suborders {
            let items = self.db.fetch_order_items(suborder.id).await?;
            details.push(SubOrderDetail { suborder, items });
        }
        Ok(OrderDetail { order, suborders: details })
    }

    //----------------------------------------      Merchant actions    ----------------------------------------------

    pub async fn suborders_for_merchant(&self, merchant_id: i64) -> Result<Vec<SubOrderDetail>, FulfillmentError> {
        let suborders = self.db.fetch_suborders_for_merchant(merchant_id).await?;
        self.with_items(suborders).await
    }

    pub async fn suborder_for_merchant(
        &self,
        merchant_id: i64,
        suborder_id: i64,
    ) -> Result<SubOrderDetail, FulfillmentError> {
        let suborder = self.owned_suborder(merchant_id, suborder_id).await?;
        let items = self.db.fetch_order_items(suborder.id).await?;
        Ok(SubOrderDetail { suborder, items })
    }

    /// A merchant's explicit status update: shipping progression on the courier track, or marking goods dropped at
    /// the hub on the cash-on-delivery track. Only the edges the transition table assigns to merchants are allowed.
    pub async fn update_status_as_merchant(
        &self,
        merchant_id: i64,
        suborder_id: i64,
        new_status: SubOrderStatus,
    ) -> Result<SubOrder, FulfillmentError> {
        let suborder = self.owned_suborder(merchant_id, suborder_id).await?;
        let previous = suborder.status;
        let updated = self.db.transition_suborder(suborder_id, new_status, ActorClass::Merchant).await?;
        self.call_status_changed_hook(&updated, previous).await;
        Ok(updated)
    }

    async fn owned_suborder(&self, merchant_id: i64, suborder_id: i64) -> Result<SubOrder, FulfillmentError> {
        let suborder =
            self.db.fetch_suborder(suborder_id).await?.ok_or(FulfillmentError::SubOrderNotFound(suborder_id))?;
        if suborder.merchant_id != merchant_id {
            return Err(FulfillmentError::Forbidden("You can only manage your own orders".to_string()));
        }
        Ok(suborder)
    }

    //----------------------------------------     Hub pickup workflow  ----------------------------------------------

    pub async fn suborders_for_hub(
        &self,
        staff_hub_id: i64,
        status: Option<SubOrderStatus>,
    ) -> Result<Vec<SubOrderDetail>, FulfillmentError> {
        let suborders = self.db.fetch_suborders_for_hub(staff_hub_id, status).await?;
        self.with_items(suborders).await
    }

    /// Hub staff accept the goods a merchant dropped off; the sub-order becomes ready for customer pickup.
    pub async fn hub_accept_delivery(
        &self,
        staff_hub_id: i64,
        suborder_id: i64,
    ) -> Result<SubOrder, FulfillmentError> {
        let suborder = self.hub_scoped_suborder(staff_hub_id, suborder_id).await?;
        let previous = suborder.status;
        let updated =
            self.db.transition_suborder(suborder_id, SubOrderStatus::AtHubReadyForPickup, ActorClass::HubStaff).await?;
        self.call_status_changed_hook(&updated, previous).await;
        Ok(updated)
    }

    /// Hub staff reject the dropped-off goods. The sub-order returns to the merchant with the reason recorded.
    pub async fn hub_reject_delivery(
        &self,
        staff_hub_id: i64,
        suborder_id: i64,
        reason: &str,
    ) -> Result<SubOrder, FulfillmentError> {
        if reason.trim().is_empty() {
            return Err(FulfillmentError::Validation("A rejection reason is required".to_string()));
        }
        let _ = self.hub_scoped_suborder(staff_hub_id, suborder_id).await?;
        let updated = self.db.reject_at_hub(suborder_id, reason).await?;
        self.call_hub_rejected_hook(&updated, reason).await;
        Ok(updated)
    }

    /// Completes a customer pickup. The cash must actually have changed hands: `payment_received` is the hub staff's
    /// explicit confirmation, and without it the pickup is rejected and the sub-order stays ready for pickup.
    pub async fn hub_complete_pickup(
        &self,
        staff_hub_id: i64,
        suborder_id: i64,
        payment_received: bool,
    ) -> Result<SubOrder, FulfillmentError> {
        if !payment_received {
            return Err(FulfillmentError::Validation(
                "Cash payment must be received before the pickup can be completed".to_string(),
            ));
        }
        let suborder = self.hub_scoped_suborder(staff_hub_id, suborder_id).await?;
        let previous = suborder.status;
        let updated = self.db.complete_pickup(suborder_id).await?;
        self.call_status_changed_hook(&updated, previous).await;
        Ok(updated)
    }

    async fn hub_scoped_suborder(&self, staff_hub_id: i64, suborder_id: i64) -> Result<SubOrder, FulfillmentError> {
        let suborder =
            self.db.fetch_suborder(suborder_id).await?.ok_or(FulfillmentError::SubOrderNotFound(suborder_id))?;
        if suborder.hub_id != Some(staff_hub_id) {
            return Err(FulfillmentError::Forbidden("This order does not belong to your hub".to_string()));
        }
        Ok(suborder)
    }

    //----------------------------------------   Cancellation & refunds ----------------------------------------------

    /// Cancels the customer's order: every sub-order must still be cancellable, otherwise the whole request is
    /// rejected and nothing changes. On success stock is restored and, for paid orders, pending refunds are opened.
    pub async fn cancel_order_as_customer(
        &self,
        customer_id: i64,
        order_id: i64,
        reason: &str,
    ) -> Result<CancellationOutcome, FulfillmentError> {
        let order =
            self.db.fetch_master_order(order_id).await?.ok_or(FulfillmentError::OrderNotFound(order_id))?;
        if order.customer_id != customer_id {
            return Err(FulfillmentError::Forbidden("You can only cancel your own orders".to_string()));
        }
        let outcome = self.db.cancel_order(order_id, reason).await?;
        self.call_order_cancelled_hook(&outcome.order, reason).await;
        Ok(outcome)
    }

    pub async fn refunds(&self, status: Option<RefundStatus>) -> Result<Vec<Refund>, FulfillmentError> {
        self.db.fetch_refunds(status).await
    }

    /// Admin: begin paying out a pending refund.
    pub async fn start_refund_processing(&self, refund_id: i64) -> Result<Refund, FulfillmentError> {
        self.db.update_refund_status(refund_id, RefundStatus::Pending, RefundStatus::Processing, None).await
    }

    /// Admin: record a completed payout, with the mobile-money transaction id of the disbursement.
    pub async fn complete_refund(&self, refund_id: i64, transaction_id: &str) -> Result<Refund, FulfillmentError> {
        self.db
            .update_refund_status(refund_id, RefundStatus::Processing, RefundStatus::Completed, Some(transaction_id))
            .await
    }

    /// Admin: record a payout that could not be made. The refund can be retried out of band.
    pub async fn fail_refund(&self, refund_id: i64) -> Result<Refund, FulfillmentError> {
        self.db.update_refund_status(refund_id, RefundStatus::Processing, RefundStatus::Failed, None).await
    }

    //----------------------------------------      Deadline expiry     ----------------------------------------------

    /// Expires hub-ready sub-orders whose pickup window lapsed before `now`. Runs on a timer, but goes through the
    /// same precondition-guarded transition as everyone else, so it can never clobber a pickup that beat it.
    pub async fn expire_overdue_pickups(&self, now: DateTime<Utc>) -> Result<ExpiryResult, FulfillmentError> {
        let result = self.db.expire_overdue_pickups(now).await?;
        for suborder in &result.expired {
            self.call_status_changed_hook(suborder, SubOrderStatus::AtHubReadyForPickup).await;
        }
        Ok(result)
    }

    //----------------------------------------         Internals        ----------------------------------------------

    async fn with_items(&self, suborders: Vec<SubOrder>) -> Result<Vec<SubOrderDetail>, FulfillmentError> {
        let mut result = Vec::with_capacity(suborders.len());
        for suborder in suborders {
            let items = self.db.fetch_order_items(suborder.id).await?;
            result.push(SubOrderDetail { suborder, items });
        }
        Ok(result)
    }

    async fn call_payment_confirmed_hook(&self, order: &MasterOrder, suborders: &[SubOrder]) {
        for emitter in &self.producers.payment_confirmed_producer {
            trace!("🔄️💰️ Notifying payment confirmed hook subscribers");
            let event = PaymentConfirmedEvent { order: order.clone(), suborders: suborders.to_vec() };
            emitter.publish_event(event).await;
        }
    }

    async fn call_status_changed_hook(&self, suborder: &SubOrder, previous: SubOrderStatus) {
        for emitter in &self.producers.status_changed_producer {
            trace!("🔄️📦️ Notifying status changed hook subscribers");
            emitter.publish_event(StatusChangedEvent::new(suborder.clone(), previous)).await;
        }
    }

    async fn call_order_cancelled_hook(&self, order: &MasterOrder, reason: &str) {
        for emitter in &self.producers.order_cancelled_producer {
            trace!("🔄️❌️ Notifying order cancelled hook subscribers");
            let event = OrderCancelledEvent { order: order.clone(), reason: reason.to_string() };
            emitter.publish_event(event).await;
        }
    }

    async fn call_hub_rejected_hook(&self, suborder: &SubOrder, reason: &str) {
        for emitter in &self.producers.hub_rejected_producer {
            trace!("🔄️🏬️ Notifying hub rejected hook subscribers");
            let event = HubRejectedEvent { suborder: suborder.clone(), reason: reason.to_string() };
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}
