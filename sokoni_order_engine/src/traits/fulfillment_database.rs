use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{MasterOrder, OrderItem, Refund, RefundStatus, SubOrder, SubOrderStatus},
    traits::data_objects::{
        CallbackResolution,
        CancellationOutcome,
        CheckoutRequest,
        ExpiryResult,
        MarketConfig,
        PaymentCallback,
    },
    transitions::ActorClass,
};

/// This trait defines the highest level of behaviour for backends supporting the order engine.
///
/// This behaviour includes:
/// * Assembling a customer's cart into a master order with per-merchant sub-orders, atomically.
/// * Reconciling inbound payment callbacks against orders, idempotently.
/// * Moving sub-orders through the status pipeline with the transition table enforced on every write.
/// * Cancellation with stock restoration and refund creation, all-or-nothing across sub-orders.
/// * Expiring hub-ready sub-orders whose pickup window has lapsed.
#[allow(async_fn_in_trait)]
pub trait FulfillmentDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Assembles the customer's cart into a master order, one sub-order per distinct merchant, in a single atomic
    /// transaction: order rows are inserted, stock is conditionally decremented per line, and the cart is cleared.
    /// Any precondition failure (empty cart, inactive product, insufficient stock, unavailable hub) aborts with no
    /// mutation at all.
    async fn checkout_cart(
        &self,
        customer_id: i64,
        request: &CheckoutRequest,
        config: &MarketConfig,
    ) -> Result<(MasterOrder, Vec<SubOrder>), FulfillmentError>;

    async fn fetch_master_order(&self, order_id: i64) -> Result<Option<MasterOrder>, FulfillmentError>;

    async fn fetch_orders_for_customer(&self, customer_id: i64) -> Result<Vec<MasterOrder>, FulfillmentError>;

    async fn fetch_suborders_for_order(&self, order_id: i64) -> Result<Vec<SubOrder>, FulfillmentError>;

    async fn fetch_suborder(&self, suborder_id: i64) -> Result<Option<SubOrder>, FulfillmentError>;

    async fn fetch_suborders_for_merchant(&self, merchant_id: i64) -> Result<Vec<SubOrder>, FulfillmentError>;

    async fn fetch_suborders_for_hub(
        &self,
        hub_id: i64,
        status: Option<SubOrderStatus>,
    ) -> Result<Vec<SubOrder>, FulfillmentError>;

    async fn fetch_order_items(&self, suborder_id: i64) -> Result<Vec<OrderItem>, FulfillmentError>;

    /// Stores the gateway correlation id after a push payment was successfully initiated for the order.
    async fn record_payment_request(&self, order_id: i64, correlation_id: &str)
        -> Result<MasterOrder, FulfillmentError>;

    /// Marks the order payment-failed after push-payment initiation failed. The order row is deliberately kept so
    /// the customer can retry payment later.
    async fn record_payment_initiation_failure(&self, order_id: i64) -> Result<MasterOrder, FulfillmentError>;

    /// Applies a payment callback to the order matching its correlation id.
    ///
    /// This call is idempotent: replaying a callback never changes state twice. A success callback moves the master
    /// order to paid, records the receipt, and moves every child sub-order `PendingPayment →
    /// PaidAwaitingShipment` in the same transaction. A failure callback marks the payment failed and touches no
    /// sub-order. Callbacks for unknown correlation ids, already-paid orders, or cancelled orders resolve without
    /// mutation — see [`CallbackResolution`].
    async fn apply_payment_callback(&self, callback: &PaymentCallback)
        -> Result<CallbackResolution, FulfillmentError>;

    /// Moves a sub-order to `to`, provided the transition table permits the edge for `actor` from the sub-order's
    /// *current* state. The status precondition is part of the UPDATE itself, so a concurrent transition makes this
    /// call fail rather than silently overwrite.
    async fn transition_suborder(
        &self,
        suborder_id: i64,
        to: SubOrderStatus,
        actor: ActorClass,
    ) -> Result<SubOrder, FulfillmentError>;

    /// Hub staff reject the goods a merchant dropped off: the sub-order returns to `PendingMerchantDelivery` and the
    /// reason is recorded on it.
    async fn reject_at_hub(&self, suborder_id: i64, reason: &str) -> Result<SubOrder, FulfillmentError>;

    /// Completes a hub pickup: the sub-order moves to `Completed`, and once every sibling sub-order is complete the
    /// master order's payment status becomes `Paid` (the cash has all been collected).
    async fn complete_pickup(&self, suborder_id: i64) -> Result<SubOrder, FulfillmentError>;

    /// Cancels a master order in one transaction: the master is flagged cancelled, every sub-order moves to
    /// `Cancelled`, stock is restored for every order item, and if the order had been paid a pending refund is
    /// created per sub-order. Rejected outright if *any* sub-order is outside the cancellable set — there is never a
    /// partial cancellation.
    async fn cancel_order(&self, order_id: i64, reason: &str) -> Result<CancellationOutcome, FulfillmentError>;

    /// Moves every `AtHubReadyForPickup` sub-order whose pickup deadline has passed to `Expired`. Each row is
    /// guarded by its status precondition, so a pickup that commits concurrently wins and drops the row from the
    /// sweep.
    async fn expire_overdue_pickups(&self, now: DateTime<Utc>) -> Result<ExpiryResult, FulfillmentError>;

    async fn fetch_refund(&self, refund_id: i64) -> Result<Option<Refund>, FulfillmentError>;

    async fn fetch_refunds(&self, status: Option<RefundStatus>) -> Result<Vec<Refund>, FulfillmentError>;

    /// Moves a refund from `from` to `to`, recording the payout transaction id when one is supplied. Fails with
    /// [`FulfillmentError::RefundStateConflict`] when the refund is not currently in `from`. Completing the last
    /// open refund of an order marks the master order `Refunded`.
    async fn update_refund_status(
        &self,
        refund_id: i64,
        from: RefundStatus,
        to: RefundStatus,
        transaction_id: Option<&str>,
    ) -> Result<Refund, FulfillmentError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), FulfillmentError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum FulfillmentError {
    #[error("We have an internal database engine error: {0}")]
    DatabaseError(String),
    #[error("{0}")]
    Validation(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(i64),
    #[error("The requested sub-order {0} does not exist")]
    SubOrderNotFound(i64),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(i64),
    #[error("The requested refund {0} does not exist")]
    RefundNotFound(i64),
    #[error("{0}")]
    Forbidden(String),
    #[error("No transition from {from} to {requested} is defined")]
    InvalidTransition { from: SubOrderStatus, requested: SubOrderStatus },
    #[error("\"{product}\" has insufficient stock. Only {available} available")]
    InsufficientStock { product: String, available: i64 },
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("Product \"{0}\" is no longer available")]
    ProductUnavailable(String),
    #[error("The selected pickup hub is not available")]
    HubUnavailable,
    #[error("Order {0} is already cancelled")]
    AlreadyCancelled(i64),
    #[error("Order {order_id} can no longer be cancelled: sub-order {suborder_id} is {status}")]
    NotCancellable { order_id: i64, suborder_id: i64, status: SubOrderStatus },
    #[error("Refund {0} is {1}, expected {2}")]
    RefundStateConflict(i64, RefundStatus, RefundStatus),
}

impl From<sqlx::Error> for FulfillmentError {
    fn from(e: sqlx::Error) -> Self {
        FulfillmentError::DatabaseError(e.to_string())
    }
}
