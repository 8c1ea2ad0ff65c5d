use sokoni_common::Cents;
use sokoni_order_engine::{
    db_types::{PaymentStatus, RefundStatus, SubOrderStatus},
    traits::{CallbackResolution, CheckoutRequest, FulfillmentError, PaymentCallback},
    CartManagement,
    CatalogManagement,
    FulfillmentDatabase,
};

mod support;
use support::{checkout_api, cod_order, flow_api, momo_order, new_db, seed_product};

const CUSTOMER: i64 = 101;
const MERCHANT_X: i64 = 11;
const MERCHANT_Y: i64 = 12;

#[tokio::test]
async fn checkout_fans_out_one_suborder_per_merchant() {
    let db = new_db().await;
    let shirt = seed_product(&db, MERCHANT_X, "Kitenge shirt", 1500, 10).await;
    let beans = seed_product(&db, MERCHANT_X, "Coffee beans 500g", 800, 20).await;
    let stool = seed_product(&db, MERCHANT_Y, "Carved stool", 4200, 3).await;
    let (order, suborders) = momo_order(&db, CUSTOMER, &[(&shirt, 2), (&beans, 1), (&stool, 1)]).await;

    assert_eq!(suborders.len(), 2, "two distinct merchants means two sub-orders");
    let subtotal_sum: Cents = suborders.iter().map(|s| s.subtotal).sum();
    assert_eq!(subtotal_sum, order.total_amount);
    assert_eq!(order.total_amount, Cents::from_shillings(2 * 1500 + 800 + 4200));
    for suborder in &suborders {
        assert_eq!(suborder.commission + suborder.merchant_payout, suborder.subtotal);
        assert_eq!(suborder.status, SubOrderStatus::PendingPayment);
        assert!(suborder.hub_id.is_none());
        assert!(suborder.pickup_deadline.is_none());
    }
    // Stock was reserved and the cart consumed.
    assert_eq!(db.fetch_product(shirt.id).await.unwrap().unwrap().stock_quantity, 8);
    assert_eq!(db.fetch_product(stool.id).await.unwrap().unwrap().stock_quantity, 2);
    assert!(db.fetch_cart(CUSTOMER).await.unwrap().is_empty());
}

#[tokio::test]
async fn commission_split_at_quarter_rate() {
    let db = new_db().await;
    let phone_cover = seed_product(&db, MERCHANT_X, "Phone cover", 1000, 5).await;
    let cable = seed_product(&db, MERCHANT_X, "USB cable", 500, 5).await;
    let (_, suborders) = momo_order(&db, CUSTOMER, &[(&phone_cover, 1), (&cable, 2)]).await;

    assert_eq!(suborders.len(), 1);
    let suborder = &suborders[0];
    assert_eq!(suborder.subtotal, Cents::from_shillings(2000));
    assert_eq!(suborder.commission, Cents::from_shillings(500));
    assert_eq!(suborder.merchant_payout, Cents::from_shillings(1500));
}

#[tokio::test]
async fn checkout_rejects_insufficient_stock_without_mutation() {
    let db = new_db().await;
    let lamp = seed_product(&db, MERCHANT_X, "Solar lamp", 2500, 1).await;
    let api = checkout_api(&db);
    api.add_to_cart(CUSTOMER, lamp.id, 1).await.unwrap();
    // Stock drops underneath the cart before checkout.
    let other_customer = 999;
    api.add_to_cart(other_customer, lamp.id, 1).await.unwrap();
    momo_order(&db, other_customer, &[]).await;

    let request = CheckoutRequest::mobile_money("0712345678", "123 Moi Avenue", "Nairobi");
    let err = api.checkout(CUSTOMER, &request).await.expect_err("stock is gone");
    match err {
        FulfillmentError::InsufficientStock { product, available } => {
            assert_eq!(product, "Solar lamp");
            assert_eq!(available, 0);
        },
        other => panic!("expected InsufficientStock, got {other}"),
    }
    // Nothing was created and the cart is intact.
    assert!(db.fetch_orders_for_customer(CUSTOMER).await.unwrap().is_empty());
    assert_eq!(db.fetch_cart(CUSTOMER).await.unwrap().lines.len(), 1);
}

#[tokio::test]
async fn checkout_rejects_empty_cart() {
    let db = new_db().await;
    let api = checkout_api(&db);
    let request = CheckoutRequest::mobile_money("0712345678", "123 Moi Avenue", "Nairobi");
    let err = api.checkout(CUSTOMER, &request).await.expect_err("cart is empty");
    assert!(matches!(err, FulfillmentError::EmptyCart));
}

#[tokio::test]
async fn add_to_cart_cannot_exceed_stock() {
    let db = new_db().await;
    let lamp = seed_product(&db, MERCHANT_X, "Solar lamp", 2500, 3).await;
    let api = checkout_api(&db);
    api.add_to_cart(CUSTOMER, lamp.id, 2).await.unwrap();
    let err = api.add_to_cart(CUSTOMER, lamp.id, 2).await.expect_err("only 3 in stock");
    assert!(matches!(err, FulfillmentError::InsufficientStock { .. }));
}

#[tokio::test]
async fn successful_callback_pays_order_and_all_suborders() {
    let db = new_db().await;
    let shirt = seed_product(&db, MERCHANT_X, "Kitenge shirt", 1500, 10).await;
    let stool = seed_product(&db, MERCHANT_Y, "Carved stool", 4200, 3).await;
    let (order, _) = momo_order(&db, CUSTOMER, &[(&shirt, 1), (&stool, 1)]).await;
    let flow = flow_api(&db);
    flow.record_payment_request(order.id, "ws_CO_0001").await.unwrap();

    let callback =
        PaymentCallback::Success { correlation_id: "ws_CO_0001".to_string(), receipt: "NLJ7RT61SV".to_string() };
    let resolution = flow.process_payment_callback(&callback).await.unwrap();
    let (order, suborders) = match resolution {
        CallbackResolution::PaymentApplied { order, suborders } => (order, suborders),
        other => panic!("expected PaymentApplied, got {other:?}"),
    };
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.momo_receipt.as_deref(), Some("NLJ7RT61SV"));
    assert!(suborders.iter().all(|s| s.status == SubOrderStatus::PaidAwaitingShipment));
}

#[tokio::test]
async fn failed_callback_leaves_suborders_pending() {
    let db = new_db().await;
    let shirt = seed_product(&db, MERCHANT_X, "Kitenge shirt", 1500, 10).await;
    let (order, _) = momo_order(&db, CUSTOMER, &[(&shirt, 1)]).await;
    let flow = flow_api(&db);
    flow.record_payment_request(order.id, "ws_CO_0002").await.unwrap();

    let callback = PaymentCallback::Failure {
        correlation_id: "ws_CO_0002".to_string(),
        description: "Request cancelled by user".to_string(),
    };
    let resolution = flow.process_payment_callback(&callback).await.unwrap();
    assert!(matches!(resolution, CallbackResolution::PaymentFailed { .. }));
    let order = db.fetch_master_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Failed);
    // The sub-orders are not cancelled; the customer can retry the payment.
    let suborders = db.fetch_suborders_for_order(order.id).await.unwrap();
    assert!(suborders.iter().all(|s| s.status == SubOrderStatus::PendingPayment));
}

#[tokio::test]
async fn replaying_a_success_callback_changes_nothing() {
    let db = new_db().await;
    let shirt = seed_product(&db, MERCHANT_X, "Kitenge shirt", 1500, 10).await;
    let (order, _) = momo_order(&db, CUSTOMER, &[(&shirt, 1)]).await;
    let flow = flow_api(&db);
    flow.record_payment_request(order.id, "ws_CO_0003").await.unwrap();
    let callback =
        PaymentCallback::Success { correlation_id: "ws_CO_0003".to_string(), receipt: "NLJ7RT61SV".to_string() };

    flow.process_payment_callback(&callback).await.unwrap();
    let first = db.fetch_master_order(order.id).await.unwrap().unwrap();
    let resolution = flow.process_payment_callback(&callback).await.unwrap();
    assert!(matches!(resolution, CallbackResolution::DuplicateSuccess { .. }));
    let second = db.fetch_master_order(order.id).await.unwrap().unwrap();
    assert_eq!(first.payment_status, second.payment_status);
    assert_eq!(first.momo_receipt, second.momo_receipt);
    assert_eq!(first.updated_at, second.updated_at);
}

#[tokio::test]
async fn unknown_correlation_id_is_acknowledged_without_mutation() {
    let db = new_db().await;
    let flow = flow_api(&db);
    let callback =
        PaymentCallback::Success { correlation_id: "ws_CO_nothing".to_string(), receipt: "X".to_string() };
    let resolution = flow.process_payment_callback(&callback).await.unwrap();
    assert!(matches!(resolution, CallbackResolution::Unmatched { .. }));
}

#[tokio::test]
async fn cancellation_restores_stock_exactly() {
    let db = new_db().await;
    let shirt = seed_product(&db, MERCHANT_X, "Kitenge shirt", 1500, 10).await;
    let stool = seed_product(&db, MERCHANT_Y, "Carved stool", 4200, 3).await;
    let (order, _) = momo_order(&db, CUSTOMER, &[(&shirt, 4), (&stool, 2)]).await;
    assert_eq!(db.fetch_product(shirt.id).await.unwrap().unwrap().stock_quantity, 6);

    let flow = flow_api(&db);
    let outcome = flow.cancel_order_as_customer(CUSTOMER, order.id, "Changed my mind").await.unwrap();
    assert!(outcome.order.is_cancelled);
    assert!(outcome.order.cancelled_at.is_some());
    assert_eq!(outcome.order.cancellation_reason.as_deref(), Some("Changed my mind"));
    assert!(outcome.suborders.iter().all(|s| s.status == SubOrderStatus::Cancelled));
    assert!(outcome.refunds.is_empty(), "unpaid orders do not open refunds");
    assert_eq!(db.fetch_product(shirt.id).await.unwrap().unwrap().stock_quantity, 10);
    assert_eq!(db.fetch_product(stool.id).await.unwrap().unwrap().stock_quantity, 3);
}

#[tokio::test]
async fn cancelling_a_paid_order_opens_pending_refunds() {
    let db = new_db().await;
    let shirt = seed_product(&db, MERCHANT_X, "Kitenge shirt", 1500, 10).await;
    let stool = seed_product(&db, MERCHANT_Y, "Carved stool", 4200, 3).await;
    let (order, _) = momo_order(&db, CUSTOMER, &[(&shirt, 1), (&stool, 1)]).await;
    let flow = flow_api(&db);
    flow.record_payment_request(order.id, "ws_CO_0004").await.unwrap();
    let callback =
        PaymentCallback::Success { correlation_id: "ws_CO_0004".to_string(), receipt: "NLJ7RT61SV".to_string() };
    flow.process_payment_callback(&callback).await.unwrap();

    let outcome = flow.cancel_order_as_customer(CUSTOMER, order.id, "Defective listing").await.unwrap();
    assert_eq!(outcome.refunds.len(), 2, "one refund per paid sub-order");
    let refunded: Cents = outcome.refunds.iter().map(|r| r.amount).sum();
    assert_eq!(refunded, order.total_amount);
    assert!(outcome.refunds.iter().all(|r| r.status == RefundStatus::Pending));
    assert_eq!(outcome.order.refund_status, Some(RefundStatus::Pending));
    assert_eq!(outcome.order.refund_amount, Some(order.total_amount));
    // Refund payout is a manual step; payment status is still paid until an admin completes it.
    assert_eq!(outcome.order.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn cancellation_is_all_or_nothing_across_suborders() {
    let db = new_db().await;
    let shirt = seed_product(&db, MERCHANT_X, "Kitenge shirt", 1500, 10).await;
    let stool = seed_product(&db, MERCHANT_Y, "Carved stool", 4200, 3).await;
    let (order, suborders) = momo_order(&db, CUSTOMER, &[(&shirt, 1), (&stool, 1)]).await;
    let flow = flow_api(&db);
    flow.record_payment_request(order.id, "ws_CO_0005").await.unwrap();
    let callback =
        PaymentCallback::Success { correlation_id: "ws_CO_0005".to_string(), receipt: "NLJ7RT61SV".to_string() };
    flow.process_payment_callback(&callback).await.unwrap();
    // Merchant X ships their half.
    let shipped =
        flow.update_status_as_merchant(MERCHANT_X, suborders[0].id, SubOrderStatus::Shipped).await.unwrap();
    assert_eq!(shipped.status, SubOrderStatus::Shipped);

    let err = flow.cancel_order_as_customer(CUSTOMER, order.id, "Too slow").await.expect_err("one half has shipped");
    assert!(matches!(err, FulfillmentError::NotCancellable { .. }));
    // Nothing moved: the shipped sub-order is still shipped, the other still awaiting shipment.
    let fresh = db.fetch_suborders_for_order(order.id).await.unwrap();
    assert_eq!(fresh[0].status, SubOrderStatus::Shipped);
    assert_eq!(fresh[1].status, SubOrderStatus::PaidAwaitingShipment);
    assert!(!db.fetch_master_order(order.id).await.unwrap().unwrap().is_cancelled);
}

#[tokio::test]
async fn late_success_callback_does_not_revive_a_cancelled_order() {
    let db = new_db().await;
    let shirt = seed_product(&db, MERCHANT_X, "Kitenge shirt", 1500, 10).await;
    let (order, _) = momo_order(&db, CUSTOMER, &[(&shirt, 1)]).await;
    let flow = flow_api(&db);
    flow.record_payment_request(order.id, "ws_CO_0006").await.unwrap();
    flow.cancel_order_as_customer(CUSTOMER, order.id, "No longer needed").await.unwrap();

    let callback =
        PaymentCallback::Success { correlation_id: "ws_CO_0006".to_string(), receipt: "NLJ7RT61SV".to_string() };
    let resolution = flow.process_payment_callback(&callback).await.unwrap();
    assert!(matches!(resolution, CallbackResolution::SupersededByCancellation { .. }));
    let order = db.fetch_master_order(order.id).await.unwrap().unwrap();
    assert!(order.is_cancelled);
    assert_ne!(order.payment_status, PaymentStatus::Paid);
    let suborders = db.fetch_suborders_for_order(order.id).await.unwrap();
    assert!(suborders.iter().all(|s| s.status == SubOrderStatus::Cancelled));
}

#[tokio::test]
async fn refund_lifecycle_is_admin_driven() {
    let db = new_db().await;
    let shirt = seed_product(&db, MERCHANT_X, "Kitenge shirt", 1500, 10).await;
    let (order, _) = momo_order(&db, CUSTOMER, &[(&shirt, 1)]).await;
    let flow = flow_api(&db);
    flow.record_payment_request(order.id, "ws_CO_0007").await.unwrap();
    let callback =
        PaymentCallback::Success { correlation_id: "ws_CO_0007".to_string(), receipt: "NLJ7RT61SV".to_string() };
    flow.process_payment_callback(&callback).await.unwrap();
    let outcome = flow.cancel_order_as_customer(CUSTOMER, order.id, "Defective").await.unwrap();
    let refund_id = outcome.refunds[0].id;

    // Completing before processing starts is a state conflict.
    let err = flow.complete_refund(refund_id, "RF123").await.expect_err("refund is still pending");
    assert!(matches!(err, FulfillmentError::RefundStateConflict(..)));

    let refund = flow.start_refund_processing(refund_id).await.unwrap();
    assert_eq!(refund.status, RefundStatus::Processing);
    let refund = flow.complete_refund(refund_id, "RF123").await.unwrap();
    assert_eq!(refund.status, RefundStatus::Completed);
    assert_eq!(refund.transaction_id.as_deref(), Some("RF123"));
    assert!(refund.processed_at.is_some());
    // The last refund settling flips the order to refunded.
    let order = db.fetch_master_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Refunded);
    assert!(order.refund_processed_at.is_some());
}

#[tokio::test]
async fn merchants_cannot_touch_each_others_suborders() {
    let db = new_db().await;
    let shirt = seed_product(&db, MERCHANT_X, "Kitenge shirt", 1500, 10).await;
    let (order, suborders) = momo_order(&db, CUSTOMER, &[(&shirt, 1)]).await;
    let flow = flow_api(&db);
    flow.record_payment_request(order.id, "ws_CO_0008").await.unwrap();
    let callback =
        PaymentCallback::Success { correlation_id: "ws_CO_0008".to_string(), receipt: "NLJ7RT61SV".to_string() };
    flow.process_payment_callback(&callback).await.unwrap();

    let err = flow
        .update_status_as_merchant(MERCHANT_Y, suborders[0].id, SubOrderStatus::Shipped)
        .await
        .expect_err("wrong merchant");
    assert!(matches!(err, FulfillmentError::Forbidden(_)));
}

#[tokio::test]
async fn off_table_transitions_are_rejected_and_leave_status_unchanged() {
    let db = new_db().await;
    let shirt = seed_product(&db, MERCHANT_X, "Kitenge shirt", 1500, 10).await;
    let (_, suborders) = momo_order(&db, CUSTOMER, &[(&shirt, 1)]).await;
    let flow = flow_api(&db);

    // Shipping an unpaid sub-order skips a state and must fail.
    let err = flow
        .update_status_as_merchant(MERCHANT_X, suborders[0].id, SubOrderStatus::Shipped)
        .await
        .expect_err("pending_payment cannot ship");
    match err {
        FulfillmentError::InvalidTransition { from, requested } => {
            assert_eq!(from, SubOrderStatus::PendingPayment);
            assert_eq!(requested, SubOrderStatus::Shipped);
        },
        other => panic!("expected InvalidTransition, got {other}"),
    }
    let fresh = db.fetch_suborder(suborders[0].id).await.unwrap().unwrap();
    assert_eq!(fresh.status, SubOrderStatus::PendingPayment);
}

#[tokio::test]
async fn customers_cannot_cancel_each_others_orders() {
    let db = new_db().await;
    let shirt = seed_product(&db, MERCHANT_X, "Kitenge shirt", 1500, 10).await;
    let (order, _) = momo_order(&db, CUSTOMER, &[(&shirt, 1)]).await;
    let flow = flow_api(&db);
    let err = flow.cancel_order_as_customer(777, order.id, "not mine").await.expect_err("wrong customer");
    assert!(matches!(err, FulfillmentError::Forbidden(_)));
}

#[tokio::test]
async fn cod_checkout_is_rejected_for_unknown_hub() {
    let db = new_db().await;
    let shirt = seed_product(&db, MERCHANT_X, "Kitenge shirt", 1500, 10).await;
    let api = checkout_api(&db);
    api.add_to_cart(CUSTOMER, shirt.id, 1).await.unwrap();
    let err = api.checkout(CUSTOMER, &CheckoutRequest::cash_on_delivery(404)).await.expect_err("hub does not exist");
    assert!(matches!(err, FulfillmentError::HubUnavailable));
    assert!(db.fetch_orders_for_customer(CUSTOMER).await.unwrap().is_empty());
}

#[tokio::test]
async fn cod_order_carries_hub_and_deadline() {
    let db = new_db().await;
    let shirt = seed_product(&db, MERCHANT_X, "Kitenge shirt", 1500, 10).await;
    let hub = support::seed_hub(&db).await;
    let (order, suborders) = cod_order(&db, CUSTOMER, hub.id, &[(&shirt, 1)]).await;
    assert_eq!(order.selected_hub_id, Some(hub.id));
    assert!(order.delivery_address.is_none());
    let suborder = &suborders[0];
    assert_eq!(suborder.status, SubOrderStatus::PendingMerchantDelivery);
    assert_eq!(suborder.hub_id, Some(hub.id));
    let deadline = suborder.pickup_deadline.expect("cash-on-delivery sub-orders get a pickup deadline");
    let window = deadline - order.created_at;
    assert_eq!(window.num_days(), 5);
}
