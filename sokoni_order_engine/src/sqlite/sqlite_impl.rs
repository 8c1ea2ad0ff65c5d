//! `SqliteDatabase` is a concrete implementation of an order engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Every flow that touches more than one row (checkout, reconciliation, pickup completion, cancellation,
//! refund settlement) runs inside a single transaction, and every status write carries its precondition in the WHERE
//! clause so that concurrent writers fail loudly instead of overwriting each other.
use std::{collections::BTreeMap, fmt::Debug};

use chrono::{DateTime, Utc};
use log::*;
use sokoni_common::Cents;
use sqlx::SqlitePool;

use super::db::{carts, db_url, hubs, new_pool, orders, products, refunds};
use crate::{
    db_types::{
        CartLine,
        Hub,
        MasterOrder,
        OrderItem,
        PaymentMethod,
        PaymentStatus,
        Product,
        Refund,
        RefundStatus,
        SubOrder,
        SubOrderStatus,
    },
    traits::{
        CallbackResolution,
        CancellationOutcome,
        CartManagement,
        CartView,
        CatalogManagement,
        CheckoutRequest,
        ExpiryResult,
        FulfillmentDatabase,
        FulfillmentError,
        MarketConfig,
        NewHub,
        NewProduct,
        PaymentCallback,
    },
    transitions::{allowed_actor, ActorClass},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, FulfillmentError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Connects using `SOKONI_DATABASE_URL`, or the default on-disk database if that is not set.
    pub async fn new_default(max_connections: u32) -> Result<Self, FulfillmentError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl FulfillmentDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn checkout_cart(
        &self,
        customer_id: i64,
        request: &CheckoutRequest,
        config: &MarketConfig,
    ) -> Result<(MasterOrder, Vec<SubOrder>), FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let lines = carts::fetch_lines(customer_id, &mut tx).await?;
        if lines.is_empty() {
            return Err(FulfillmentError::EmptyCart);
        }
        for line in &lines {
            if !line.is_active {
                return Err(FulfillmentError::ProductUnavailable(line.name.clone()));
            }
            if line.stock_quantity < line.quantity {
                return Err(FulfillmentError::InsufficientStock {
                    product: line.name.clone(),
                    available: line.stock_quantity,
                });
            }
        }
        let is_cod = request.payment_method == PaymentMethod::CashOnDelivery;
        if is_cod {
            let hub_id = request.hub_id.ok_or(FulfillmentError::HubUnavailable)?;
            match hubs::fetch_hub(hub_id, &mut tx).await? {
                Some(hub) if hub.is_active => {},
                _ => return Err(FulfillmentError::HubUnavailable),
            }
        }
        // Group cart lines per merchant. The BTreeMap keeps sub-order creation deterministic.
        let mut groups: BTreeMap<i64, Vec<&CartLine>> = BTreeMap::new();
        for line in &lines {
            groups.entry(line.merchant_id).or_default().push(line);
        }
        let total: Cents = lines.iter().map(CartLine::line_total).sum();
        let order_id = orders::insert_master_order(customer_id, total, request, &mut tx).await?;
        let initial_status = SubOrderStatus::initial_for(request.payment_method);
        let pickup_deadline = is_cod.then(|| config.pickup_deadline_from(Utc::now()));
        let hub_id = if is_cod { request.hub_id } else { None };
        for (merchant_id, group) in &groups {
            let subtotal: Cents = group.iter().map(|line| line.line_total()).sum();
            let (commission, merchant_payout) = subtotal.split(config.commission_rate_bps);
            let suborder_id = orders::insert_suborder(
                order_id,
                *merchant_id,
                hub_id,
                initial_status,
                subtotal,
                commission,
                merchant_payout,
                pickup_deadline,
                &mut tx,
            )
            .await?;
            for line in group {
                orders::insert_order_item(suborder_id, line.product_id, line.quantity, line.unit_price, &mut tx)
                    .await?;
                if !products::reserve_stock(line.product_id, line.quantity, &mut tx).await? {
                    let available = products::fetch_product(line.product_id, &mut tx)
                        .await?
                        .map(|p| p.stock_quantity)
                        .unwrap_or(0);
                    return Err(FulfillmentError::InsufficientStock { product: line.name.clone(), available });
                }
            }
        }
        let cart_id = carts::fetch_or_create_cart(customer_id, &mut tx).await?;
        carts::clear_cart(cart_id, &mut tx).await?;
        let order =
            orders::fetch_master_order(order_id, &mut tx).await?.ok_or(FulfillmentError::OrderNotFound(order_id))?;
        let suborders = orders::fetch_suborders_for_order(order_id, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🧾️ Checkout complete for customer #{customer_id}: order #{order_id} with {} sub-orders totalling {total}",
            suborders.len()
        );
        Ok((order, suborders))
    }

    async fn fetch_master_order(&self, order_id: i64) -> Result<Option<MasterOrder>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_master_order(order_id, &mut conn).await?)
    }

    async fn fetch_orders_for_customer(&self, customer_id: i64) -> Result<Vec<MasterOrder>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_customer(customer_id, &mut conn).await?)
    }

    async fn fetch_suborders_for_order(&self, order_id: i64) -> Result<Vec<SubOrder>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_suborders_for_order(order_id, &mut conn).await?)
    }

    async fn fetch_suborder(&self, suborder_id: i64) -> Result<Option<SubOrder>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_suborder(suborder_id, &mut conn).await?)
    }

    async fn fetch_suborders_for_merchant(&self, merchant_id: i64) -> Result<Vec<SubOrder>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_suborders_for_merchant(merchant_id, &mut conn).await?)
    }

    async fn fetch_suborders_for_hub(
        &self,
        hub_id: i64,
        status: Option<SubOrderStatus>,
    ) -> Result<Vec<SubOrder>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_suborders_for_hub(hub_id, status, &mut conn).await?)
    }

    async fn fetch_order_items(&self, suborder_id: i64) -> Result<Vec<OrderItem>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_items(suborder_id, &mut conn).await?)
    }

    async fn record_payment_request(
        &self,
        order_id: i64,
        correlation_id: &str,
    ) -> Result<MasterOrder, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        if !orders::set_correlation_id(order_id, correlation_id, &mut conn).await? {
            return Err(FulfillmentError::OrderNotFound(order_id));
        }
        orders::fetch_master_order(order_id, &mut conn).await?.ok_or(FulfillmentError::OrderNotFound(order_id))
    }

    async fn record_payment_initiation_failure(&self, order_id: i64) -> Result<MasterOrder, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        if !orders::set_payment_failed(order_id, &mut conn).await? {
            warn!("💸️ Order #{order_id} was not pending when payment initiation failed. Leaving it untouched.");
        }
        orders::fetch_master_order(order_id, &mut conn).await?.ok_or(FulfillmentError::OrderNotFound(order_id))
    }

    async fn apply_payment_callback(
        &self,
        callback: &PaymentCallback,
    ) -> Result<CallbackResolution, FulfillmentError> {
        match callback {
            PaymentCallback::Success { correlation_id, receipt } => {
                let mut tx = self.pool.begin().await?;
                let order = match orders::fetch_master_order_by_correlation(correlation_id, &mut tx).await? {
                    Some(order) => order,
                    None => return Ok(CallbackResolution::Unmatched { correlation_id: correlation_id.clone() }),
                };
                // A cancellation that won the race keeps the order cancelled. A paid callback never revives it.
                if order.is_cancelled {
                    return Ok(CallbackResolution::SupersededByCancellation { order_id: order.id });
                }
                if order.payment_status == PaymentStatus::Paid {
                    return Ok(CallbackResolution::DuplicateSuccess { order_id: order.id });
                }
                if !orders::mark_order_paid(order.id, receipt, &mut tx).await? {
                    return Ok(CallbackResolution::DuplicateSuccess { order_id: order.id });
                }
                let suborders = orders::fetch_suborders_for_order(order.id, &mut tx).await?;
                for suborder in &suborders {
                    if suborder.status == SubOrderStatus::PendingPayment {
                        orders::update_suborder_status(
                            suborder.id,
                            SubOrderStatus::PendingPayment,
                            SubOrderStatus::PaidAwaitingShipment,
                            &mut tx,
                        )
                        .await?;
                    }
                }
                let order = orders::fetch_master_order(order.id, &mut tx)
                    .await?
                    .ok_or(FulfillmentError::OrderNotFound(order.id))?;
                let suborders = orders::fetch_suborders_for_order(order.id, &mut tx).await?;
                tx.commit().await?;
                Ok(CallbackResolution::PaymentApplied { order, suborders })
            },
            PaymentCallback::Failure { correlation_id, description } => {
                let mut conn = self.pool.acquire().await?;
                let order = match orders::fetch_master_order_by_correlation(correlation_id, &mut conn).await? {
                    Some(order) => order,
                    None => return Ok(CallbackResolution::Unmatched { correlation_id: correlation_id.clone() }),
                };
                if order.is_cancelled || order.payment_status != PaymentStatus::Pending {
                    return Ok(CallbackResolution::Ignored { order_id: order.id });
                }
                orders::set_payment_failed(order.id, &mut conn).await?;
                debug!("💸️ Payment for order #{} failed: {description}", order.id);
                let order = orders::fetch_master_order(order.id, &mut conn)
                    .await?
                    .ok_or(FulfillmentError::OrderNotFound(order.id))?;
                Ok(CallbackResolution::PaymentFailed { order })
            },
        }
    }

    async fn transition_suborder(
        &self,
        suborder_id: i64,
        to: SubOrderStatus,
        actor: ActorClass,
    ) -> Result<SubOrder, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let suborder = orders::fetch_suborder(suborder_id, &mut conn)
            .await?
            .ok_or(FulfillmentError::SubOrderNotFound(suborder_id))?;
        if allowed_actor(suborder.status, to) != Some(actor) {
            return Err(FulfillmentError::InvalidTransition { from: suborder.status, requested: to });
        }
        if !orders::update_suborder_status(suborder_id, suborder.status, to, &mut conn).await? {
            // Someone else committed first; report against the fresh status.
            let fresh = orders::fetch_suborder(suborder_id, &mut conn)
                .await?
                .ok_or(FulfillmentError::SubOrderNotFound(suborder_id))?;
            return Err(FulfillmentError::InvalidTransition { from: fresh.status, requested: to });
        }
        orders::fetch_suborder(suborder_id, &mut conn)
            .await?
            .ok_or(FulfillmentError::SubOrderNotFound(suborder_id))
    }

    async fn reject_at_hub(&self, suborder_id: i64, reason: &str) -> Result<SubOrder, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let suborder = orders::fetch_suborder(suborder_id, &mut conn)
            .await?
            .ok_or(FulfillmentError::SubOrderNotFound(suborder_id))?;
        if suborder.status != SubOrderStatus::AtHubVerificationPending {
            return Err(FulfillmentError::InvalidTransition {
                from: suborder.status,
                requested: SubOrderStatus::PendingMerchantDelivery,
            });
        }
        if !orders::set_rejection(suborder_id, reason, &mut conn).await? {
            let fresh = orders::fetch_suborder(suborder_id, &mut conn)
                .await?
                .ok_or(FulfillmentError::SubOrderNotFound(suborder_id))?;
            return Err(FulfillmentError::InvalidTransition {
                from: fresh.status,
                requested: SubOrderStatus::PendingMerchantDelivery,
            });
        }
        orders::fetch_suborder(suborder_id, &mut conn)
            .await?
            .ok_or(FulfillmentError::SubOrderNotFound(suborder_id))
    }

    async fn complete_pickup(&self, suborder_id: i64) -> Result<SubOrder, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let suborder = orders::fetch_suborder(suborder_id, &mut tx)
            .await?
            .ok_or(FulfillmentError::SubOrderNotFound(suborder_id))?;
        if suborder.status != SubOrderStatus::AtHubReadyForPickup {
            return Err(FulfillmentError::InvalidTransition {
                from: suborder.status,
                requested: SubOrderStatus::Completed,
            });
        }
        if !orders::update_suborder_status(
            suborder_id,
            SubOrderStatus::AtHubReadyForPickup,
            SubOrderStatus::Completed,
            &mut tx,
        )
        .await?
        {
            let fresh = orders::fetch_suborder(suborder_id, &mut tx)
                .await?
                .ok_or(FulfillmentError::SubOrderNotFound(suborder_id))?;
            return Err(FulfillmentError::InvalidTransition { from: fresh.status, requested: SubOrderStatus::Completed });
        }
        // Once every sibling is complete, all the cash for the order has been collected at the hub.
        if orders::count_incomplete_suborders(suborder.master_order_id, &mut tx).await? == 0 {
            orders::mark_order_paid_in_cash(suborder.master_order_id, &mut tx).await?;
        }
        let completed = orders::fetch_suborder(suborder_id, &mut tx)
            .await?
            .ok_or(FulfillmentError::SubOrderNotFound(suborder_id))?;
        tx.commit().await?;
        Ok(completed)
    }

    async fn cancel_order(&self, order_id: i64, reason: &str) -> Result<CancellationOutcome, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let order =
            orders::fetch_master_order(order_id, &mut tx).await?.ok_or(FulfillmentError::OrderNotFound(order_id))?;
        if order.is_cancelled {
            return Err(FulfillmentError::AlreadyCancelled(order_id));
        }
        let suborders = orders::fetch_suborders_for_order(order_id, &mut tx).await?;
        // All-or-nothing: one non-cancellable sub-order vetoes the whole cancellation.
        for suborder in &suborders {
            if !suborder.status.is_cancellable() {
                return Err(FulfillmentError::NotCancellable {
                    order_id,
                    suborder_id: suborder.id,
                    status: suborder.status,
                });
            }
        }
        let now = Utc::now();
        if !orders::mark_order_cancelled(order_id, reason, now, &mut tx).await? {
            return Err(FulfillmentError::AlreadyCancelled(order_id));
        }
        let mut opened_refunds = Vec::new();
        for suborder in &suborders {
            if !orders::update_suborder_status(suborder.id, suborder.status, SubOrderStatus::Cancelled, &mut tx).await?
            {
                return Err(FulfillmentError::NotCancellable {
                    order_id,
                    suborder_id: suborder.id,
                    status: suborder.status,
                });
            }
            for item in orders::fetch_order_items(suborder.id, &mut tx).await? {
                products::restore_stock(item.product_id, item.quantity, &mut tx).await?;
            }
            if order.payment_status == PaymentStatus::Paid {
                let refund =
                    refunds::insert_refund(suborder.id, order.customer_id, suborder.subtotal, reason, &mut tx).await?;
                opened_refunds.push(refund);
            }
        }
        if order.payment_status == PaymentStatus::Paid {
            orders::set_refund_opened(order_id, order.total_amount, &mut tx).await?;
        }
        let order =
            orders::fetch_master_order(order_id, &mut tx).await?.ok_or(FulfillmentError::OrderNotFound(order_id))?;
        let suborders = orders::fetch_suborders_for_order(order_id, &mut tx).await?;
        tx.commit().await?;
        info!("🧾️ Order #{order_id} cancelled ({} refunds opened)", opened_refunds.len());
        Ok(CancellationOutcome { order, suborders, refunds: opened_refunds })
    }

    async fn expire_overdue_pickups(&self, now: DateTime<Utc>) -> Result<ExpiryResult, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let candidates = orders::select_overdue_pickup_ids(now, &mut conn).await?;
        let mut result = ExpiryResult::default();
        for suborder_id in candidates {
            // The guarded update loses gracefully to a pickup that completes between the select and here.
            let expired = orders::update_suborder_status(
                suborder_id,
                SubOrderStatus::AtHubReadyForPickup,
                SubOrderStatus::Expired,
                &mut conn,
            )
            .await?;
            if expired {
                if let Some(suborder) = orders::fetch_suborder(suborder_id, &mut conn).await? {
                    result.expired.push(suborder);
                }
            } else {
                debug!("🕰️ Sub-order #{suborder_id} was picked up before the expiry sweep got to it");
            }
        }
        Ok(result)
    }

    async fn fetch_refund(&self, refund_id: i64) -> Result<Option<Refund>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(refunds::fetch_refund(refund_id, &mut conn).await?)
    }

    async fn fetch_refunds(&self, status: Option<RefundStatus>) -> Result<Vec<Refund>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(refunds::fetch_refunds(status, &mut conn).await?)
    }

    async fn update_refund_status(
        &self,
        refund_id: i64,
        from: RefundStatus,
        to: RefundStatus,
        transaction_id: Option<&str>,
    ) -> Result<Refund, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let refund =
            refunds::fetch_refund(refund_id, &mut tx).await?.ok_or(FulfillmentError::RefundNotFound(refund_id))?;
        if refund.status != from {
            return Err(FulfillmentError::RefundStateConflict(refund_id, refund.status, from));
        }
        let settled = matches!(to, RefundStatus::Completed | RefundStatus::Failed);
        let processed_at = settled.then(Utc::now);
        if !refunds::update_refund_status(refund_id, from, to, transaction_id, processed_at, &mut tx).await? {
            let fresh =
                refunds::fetch_refund(refund_id, &mut tx).await?.ok_or(FulfillmentError::RefundNotFound(refund_id))?;
            return Err(FulfillmentError::RefundStateConflict(refund_id, fresh.status, from));
        }
        if to == RefundStatus::Completed {
            let suborder = orders::fetch_suborder(refund.suborder_id, &mut tx)
                .await?
                .ok_or(FulfillmentError::SubOrderNotFound(refund.suborder_id))?;
            if refunds::count_unsettled_refunds_for_order(suborder.master_order_id, &mut tx).await? == 0 {
                orders::mark_order_refunded(suborder.master_order_id, Utc::now(), &mut tx).await?;
            }
        }
        let refund =
            refunds::fetch_refund(refund_id, &mut tx).await?.ok_or(FulfillmentError::RefundNotFound(refund_id))?;
        tx.commit().await?;
        Ok(refund)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::insert_product(&product, &mut conn).await?)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_product(product_id, &mut conn).await?)
    }

    async fn insert_hub(&self, hub: NewHub) -> Result<Hub, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(hubs::insert_hub(&hub, &mut conn).await?)
    }

    async fn fetch_hub(&self, hub_id: i64) -> Result<Option<Hub>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(hubs::fetch_hub(hub_id, &mut conn).await?)
    }

    async fn restore_stock(&self, product_id: i64, quantity: i64) -> Result<(), FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::restore_stock(product_id, quantity, &mut conn).await?)
    }
}

impl CartManagement for SqliteDatabase {
    async fn add_to_cart(
        &self,
        customer_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<CartView, FulfillmentError> {
        if quantity <= 0 {
            return Err(FulfillmentError::Validation("Quantity must be positive".to_string()));
        }
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn)
            .await?
            .ok_or(FulfillmentError::ProductNotFound(product_id))?;
        if !product.is_active {
            return Err(FulfillmentError::ProductUnavailable(product.name));
        }
        let cart_id = carts::fetch_or_create_cart(customer_id, &mut conn).await?;
        let existing = carts::line_quantity(cart_id, product_id, &mut conn).await?;
        if existing + quantity > product.stock_quantity {
            return Err(FulfillmentError::InsufficientStock {
                product: product.name,
                available: product.stock_quantity,
            });
        }
        carts::upsert_line(cart_id, product_id, quantity, &mut conn).await?;
        let lines = carts::fetch_lines(customer_id, &mut conn).await?;
        Ok(CartView::from_lines(lines))
    }

    async fn remove_from_cart(&self, customer_id: i64, product_id: i64) -> Result<CartView, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let cart_id = carts::fetch_or_create_cart(customer_id, &mut conn).await?;
        carts::remove_line(cart_id, product_id, &mut conn).await?;
        let lines = carts::fetch_lines(customer_id, &mut conn).await?;
        Ok(CartView::from_lines(lines))
    }

    async fn fetch_cart(&self, customer_id: i64) -> Result<CartView, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let lines = carts::fetch_lines(customer_id, &mut conn).await?;
        Ok(CartView::from_lines(lines))
    }
}
