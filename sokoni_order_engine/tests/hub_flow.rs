use chrono::{Duration, Utc};
use sokoni_order_engine::{
    db_types::{PaymentStatus, SubOrderStatus},
    traits::FulfillmentError,
    FulfillmentDatabase,
};

mod support;
use support::{cod_order, flow_api, new_db, seed_hub, seed_product};

const CUSTOMER: i64 = 201;
const MERCHANT: i64 = 21;
const OTHER_HUB: i64 = 9999;

#[tokio::test]
async fn full_pickup_flow_completes_order_and_collects_cash() {
    let db = new_db().await;
    let basket = seed_product(&db, MERCHANT, "Sisal basket", 900, 5).await;
    let hub = seed_hub(&db).await;
    let (order, suborders) = cod_order(&db, CUSTOMER, hub.id, &[(&basket, 2)]).await;
    let flow = flow_api(&db);
    let suborder_id = suborders[0].id;

    // Merchant drops the goods at the hub.
    let dropped = flow
        .update_status_as_merchant(MERCHANT, suborder_id, SubOrderStatus::AtHubVerificationPending)
        .await
        .unwrap();
    assert_eq!(dropped.status, SubOrderStatus::AtHubVerificationPending);

    // Hub staff verify and shelve them.
    let verified = flow.hub_accept_delivery(hub.id, suborder_id).await.unwrap();
    assert_eq!(verified.status, SubOrderStatus::AtHubReadyForPickup);

    // Customer collects and pays cash.
    let completed = flow.hub_complete_pickup(hub.id, suborder_id, true).await.unwrap();
    assert_eq!(completed.status, SubOrderStatus::Completed);
    let order = db.fetch_master_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid, "cash for the whole order has been collected");
}

#[tokio::test]
async fn rejection_returns_goods_to_merchant_and_records_reason() {
    let db = new_db().await;
    let basket = seed_product(&db, MERCHANT, "Sisal basket", 900, 5).await;
    let hub = seed_hub(&db).await;
    let (_, suborders) = cod_order(&db, CUSTOMER, hub.id, &[(&basket, 1)]).await;
    let flow = flow_api(&db);
    let suborder_id = suborders[0].id;
    flow.update_status_as_merchant(MERCHANT, suborder_id, SubOrderStatus::AtHubVerificationPending).await.unwrap();

    let rejected =
        flow.hub_reject_delivery(hub.id, suborder_id, "Packaging damaged in two places").await.unwrap();
    assert_eq!(rejected.status, SubOrderStatus::PendingMerchantDelivery);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Packaging damaged in two places"));

    // Rejecting again is not possible: the sub-order is back with the merchant.
    let err =
        flow.hub_reject_delivery(hub.id, suborder_id, "Still damaged").await.expect_err("nothing to reject");
    assert!(matches!(err, FulfillmentError::InvalidTransition { .. }));
    let fresh = db.fetch_suborder(suborder_id).await.unwrap().unwrap();
    assert_eq!(fresh.status, SubOrderStatus::PendingMerchantDelivery);
}

#[tokio::test]
async fn pickup_without_cash_is_rejected() {
    let db = new_db().await;
    let basket = seed_product(&db, MERCHANT, "Sisal basket", 900, 5).await;
    let hub = seed_hub(&db).await;
    let (_, suborders) = cod_order(&db, CUSTOMER, hub.id, &[(&basket, 1)]).await;
    let flow = flow_api(&db);
    let suborder_id = suborders[0].id;
    flow.update_status_as_merchant(MERCHANT, suborder_id, SubOrderStatus::AtHubVerificationPending).await.unwrap();
    flow.hub_accept_delivery(hub.id, suborder_id).await.unwrap();

    let err = flow.hub_complete_pickup(hub.id, suborder_id, false).await.expect_err("no cash, no goods");
    assert!(matches!(err, FulfillmentError::Validation(_)));
    let fresh = db.fetch_suborder(suborder_id).await.unwrap().unwrap();
    assert_eq!(fresh.status, SubOrderStatus::AtHubReadyForPickup);
}

#[tokio::test]
async fn hub_staff_are_scoped_to_their_own_hub() {
    let db = new_db().await;
    let basket = seed_product(&db, MERCHANT, "Sisal basket", 900, 5).await;
    let hub = seed_hub(&db).await;
    let (_, suborders) = cod_order(&db, CUSTOMER, hub.id, &[(&basket, 1)]).await;
    let flow = flow_api(&db);
    let suborder_id = suborders[0].id;
    flow.update_status_as_merchant(MERCHANT, suborder_id, SubOrderStatus::AtHubVerificationPending).await.unwrap();

    let err = flow.hub_accept_delivery(OTHER_HUB, suborder_id).await.expect_err("different hub");
    assert!(matches!(err, FulfillmentError::Forbidden(_)));
    let err = flow.hub_reject_delivery(OTHER_HUB, suborder_id, "not even ours").await.expect_err("different hub");
    assert!(matches!(err, FulfillmentError::Forbidden(_)));
}

#[tokio::test]
async fn empty_rejection_reason_is_invalid() {
    let db = new_db().await;
    let basket = seed_product(&db, MERCHANT, "Sisal basket", 900, 5).await;
    let hub = seed_hub(&db).await;
    let (_, suborders) = cod_order(&db, CUSTOMER, hub.id, &[(&basket, 1)]).await;
    let flow = flow_api(&db);
    let suborder_id = suborders[0].id;
    flow.update_status_as_merchant(MERCHANT, suborder_id, SubOrderStatus::AtHubVerificationPending).await.unwrap();

    let err = flow.hub_reject_delivery(hub.id, suborder_id, "   ").await.expect_err("reason required");
    assert!(matches!(err, FulfillmentError::Validation(_)));
}

#[tokio::test]
async fn expiry_sweep_only_takes_overdue_hub_ready_suborders() {
    let db = new_db().await;
    let basket = seed_product(&db, MERCHANT, "Sisal basket", 900, 10).await;
    let hub = seed_hub(&db).await;
    let flow = flow_api(&db);

    // Two cash-on-delivery orders reach the shelf; a third is still with the merchant.
    let (_, forgotten) = cod_order(&db, CUSTOMER, hub.id, &[(&basket, 1)]).await;
    let (_, collected) = cod_order(&db, 202, hub.id, &[(&basket, 1)]).await;
    let (_, undelivered) = cod_order(&db, 203, hub.id, &[(&basket, 1)]).await;
    for suborders in [&forgotten, &collected] {
        let id = suborders[0].id;
        flow.update_status_as_merchant(MERCHANT, id, SubOrderStatus::AtHubVerificationPending).await.unwrap();
        flow.hub_accept_delivery(hub.id, id).await.unwrap();
    }
    // One customer collects before the window closes.
    flow.hub_complete_pickup(hub.id, collected[0].id, true).await.unwrap();

    // Nothing is overdue yet.
    let result = flow.expire_overdue_pickups(Utc::now()).await.unwrap();
    assert_eq!(result.count(), 0);

    // Six days later the sweep fires. Only the uncollected, hub-ready sub-order expires.
    let result = flow.expire_overdue_pickups(Utc::now() + Duration::days(6)).await.unwrap();
    assert_eq!(result.count(), 1);
    assert_eq!(result.expired[0].id, forgotten[0].id);
    assert_eq!(result.expired[0].status, SubOrderStatus::Expired);
    assert_eq!(
        db.fetch_suborder(collected[0].id).await.unwrap().unwrap().status,
        SubOrderStatus::Completed,
        "a completed pickup is never expired"
    );
    assert_eq!(
        db.fetch_suborder(undelivered[0].id).await.unwrap().unwrap().status,
        SubOrderStatus::PendingMerchantDelivery,
        "only hub-ready sub-orders are in the sweep's scope"
    );

    // Running the sweep again finds nothing new, and the expired sub-order can no longer be collected.
    let result = flow.expire_overdue_pickups(Utc::now() + Duration::days(6)).await.unwrap();
    assert_eq!(result.count(), 0);
    let err = flow.hub_complete_pickup(hub.id, forgotten[0].id, true).await.expect_err("window closed");
    assert!(matches!(err, FulfillmentError::InvalidTransition { .. }));
}
