use std::sync::Arc;

use actix_web::{http::StatusCode, test, App};
use serde_json::json;
use sokoni_common::Cents;
use sokoni_order_engine::{
    db_types::{PaymentStatus, Role, SubOrderStatus},
    traits::{CatalogManagement, NewHub, NewProduct},
    FulfillmentDatabase,
    SqliteDatabase,
};

use super::helpers::{bearer, configure, issue_token, new_db, MockGateway};
use crate::integrations::daraja::{PushPaymentClient, PushPaymentError};

const CUSTOMER: i64 = 42;
const MERCHANT: i64 = 7;

async fn seed_product(db: &SqliteDatabase, name: &str, price_shillings: i64, stock: i64) -> i64 {
    db.insert_product(NewProduct {
        merchant_id: MERCHANT,
        name: name.to_string(),
        price: Cents::from_shillings(price_shillings),
        stock_quantity: stock,
    })
    .await
    .expect("product should insert")
    .id
}

fn accepting_gateway() -> Arc<dyn PushPaymentClient> {
    let mut gateway = MockGateway::new();
    gateway.expect_initiate_push_payment().returning(|_, _, _, _| Ok("ws_CO_TEST_1".to_string()));
    Arc::new(gateway)
}

fn refusing_gateway() -> Arc<dyn PushPaymentClient> {
    let mut gateway = MockGateway::new();
    gateway
        .expect_initiate_push_payment()
        .returning(|_, _, _, _| Err(PushPaymentError("DS timeout user cannot be reached".to_string())));
    Arc::new(gateway)
}

#[actix_web::test]
async fn checkout_without_a_token_is_unauthorized() {
    let db = new_db().await;
    let app = test::init_service(App::new().configure(configure(db, accepting_gateway()))).await;
    let req = test::TestRequest::post()
        .uri("/api/orders")
        .set_json(json!({ "payment_method": "cash_on_delivery", "hub_id": 1 }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn merchants_cannot_use_customer_endpoints() {
    let db = new_db().await;
    let app = test::init_service(App::new().configure(configure(db, accepting_gateway()))).await;
    let token = issue_token(MERCHANT, Role::Merchant, None);
    let req = test::TestRequest::get().uri("/api/orders").insert_header(bearer(&token)).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn cod_checkout_round_trip() {
    let db = new_db().await;
    let product_id = seed_product(&db, "Sisal basket", 900, 5).await;
    let hub = db.insert_hub(NewHub { name: "CBD Hub".to_string(), city: "Nairobi".to_string() }).await.unwrap();
    let app = test::init_service(App::new().configure(configure(db.clone(), accepting_gateway()))).await;
    let token = issue_token(CUSTOMER, Role::Customer, None);

    let req = test::TestRequest::post()
        .uri("/api/cart")
        .insert_header(bearer(&token))
        .set_json(json!({ "product_id": product_id, "quantity": 2 }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/orders")
        .insert_header(bearer(&token))
        .set_json(json!({ "payment_method": "cash_on_delivery", "hub_id": hub.id }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["order"]["payment_method"], "cash_on_delivery");
    assert_eq!(body["suborders"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["suborders"][0]["status"], "pending_merchant_delivery");
}

#[actix_web::test]
async fn mobile_money_checkout_initiates_push_and_the_callback_pays() {
    let db = new_db().await;
    let product_id = seed_product(&db, "Kitenge shirt", 1500, 5).await;
    let app = test::init_service(App::new().configure(configure(db.clone(), accepting_gateway()))).await;
    let token = issue_token(CUSTOMER, Role::Customer, None);

    let req = test::TestRequest::post()
        .uri("/api/cart")
        .insert_header(bearer(&token))
        .set_json(json!({ "product_id": product_id, "quantity": 1 }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/orders")
        .insert_header(bearer(&token))
        .set_json(json!({
            "payment_method": "mobile_money_delivery",
            "momo_phone": "0712345678",
            "delivery_address": "123 Moi Avenue",
            "delivery_city": "Nairobi",
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = test::read_body_json(res).await;
    let order_id = body["order"]["id"].as_i64().expect("order id in response");
    assert_eq!(body["order"]["correlation_id"], "ws_CO_TEST_1");

    // The gateway reports success out of band.
    let envelope = json!({
        "Body": { "stkCallback": {
            "CheckoutRequestID": "ws_CO_TEST_1",
            "ResultCode": 0,
            "ResultDesc": "The service request is processed successfully.",
            "CallbackMetadata": { "Item": [
                { "Name": "Amount", "Value": 1500 },
                { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
            ]}
        }}
    });
    let req = test::TestRequest::post().uri("/gateway/daraja/callback").set_json(envelope).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let ack: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(ack["ResultCode"], 0);

    let order = db.fetch_master_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    let suborders = db.fetch_suborders_for_order(order_id).await.unwrap();
    assert!(suborders.iter().all(|s| s.status == SubOrderStatus::PaidAwaitingShipment));
}

#[actix_web::test]
async fn gateway_refusal_keeps_the_order_in_a_retryable_failed_state() {
    let db = new_db().await;
    let product_id = seed_product(&db, "Kitenge shirt", 1500, 5).await;
    let app = test::init_service(App::new().configure(configure(db.clone(), refusing_gateway()))).await;
    let token = issue_token(CUSTOMER, Role::Customer, None);

    let req = test::TestRequest::post()
        .uri("/api/cart")
        .insert_header(bearer(&token))
        .set_json(json!({ "product_id": product_id, "quantity": 1 }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/orders")
        .insert_header(bearer(&token))
        .set_json(json!({
            "payment_method": "mobile_money_delivery",
            "momo_phone": "0712345678",
            "delivery_address": "123 Moi Avenue",
            "delivery_city": "Nairobi",
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    // The order was NOT rolled back: it sits in payment-failed so the customer can retry.
    let orders = db.fetch_orders_for_customer(CUSTOMER).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].payment_status, PaymentStatus::Failed);
}

#[actix_web::test]
async fn unknown_correlation_ids_are_acknowledged() {
    let db = new_db().await;
    let app = test::init_service(App::new().configure(configure(db, accepting_gateway()))).await;
    let envelope = json!({
        "Body": { "stkCallback": { "CheckoutRequestID": "ws_CO_UNKNOWN", "ResultCode": 0, "ResultDesc": "ok",
            "CallbackMetadata": { "Item": [{ "Name": "MpesaReceiptNumber", "Value": "XYZ" }]}}}
    });
    let req = test::TestRequest::post().uri("/gateway/daraja/callback").set_json(envelope).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK, "the gateway must never be told to retry");
}

#[actix_web::test]
async fn hub_staff_without_an_assigned_hub_are_rejected() {
    let db = new_db().await;
    let app = test::init_service(App::new().configure(configure(db, accepting_gateway()))).await;
    let token = issue_token(9, Role::HubStaff, None);
    let req = test::TestRequest::get().uri("/api/hub/orders").insert_header(bearer(&token)).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn customers_cannot_reach_admin_refunds() {
    let db = new_db().await;
    let app = test::init_service(App::new().configure(configure(db, accepting_gateway()))).await;
    let token = issue_token(CUSTOMER, Role::Customer, None);
    let req = test::TestRequest::get().uri("/api/admin/refunds").insert_header(bearer(&token)).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}
