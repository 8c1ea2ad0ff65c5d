#![allow(dead_code)]

use sokoni_common::Cents;
use sokoni_order_engine::{
    db_types::{Hub, MasterOrder, Product, SubOrder},
    events::EventProducers,
    traits::{CatalogManagement, CheckoutRequest, MarketConfig, NewHub, NewProduct},
    CartManagement,
    CheckoutApi,
    OrderFlowApi,
    SqliteDatabase,
};

pub async fn new_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("in-memory database should open")
}

pub fn checkout_api(db: &SqliteDatabase) -> CheckoutApi<SqliteDatabase> {
    CheckoutApi::new(db.clone(), MarketConfig::default(), EventProducers::default())
}

pub fn flow_api(db: &SqliteDatabase) -> OrderFlowApi<SqliteDatabase> {
    OrderFlowApi::new(db.clone(), EventProducers::default())
}

pub async fn seed_product(
    db: &SqliteDatabase,
    merchant_id: i64,
    name: &str,
    price_shillings: i64,
    stock: i64,
) -> Product {
    db.insert_product(NewProduct {
        merchant_id,
        name: name.to_string(),
        price: Cents::from_shillings(price_shillings),
        stock_quantity: stock,
    })
    .await
    .expect("product should insert")
}

pub async fn seed_hub(db: &SqliteDatabase) -> Hub {
    db.insert_hub(NewHub { name: "Westlands Hub".to_string(), city: "Nairobi".to_string() })
        .await
        .expect("hub should insert")
}

/// Puts one unit of each product in the customer's cart and checks out with mobile money.
pub async fn momo_order(
    db: &SqliteDatabase,
    customer_id: i64,
    products: &[(&Product, i64)],
) -> (MasterOrder, Vec<SubOrder>) {
    let api = checkout_api(db);
    for (product, quantity) in products {
        api.add_to_cart(customer_id, product.id, *quantity).await.expect("add to cart should succeed");
    }
    let request = CheckoutRequest::mobile_money("0712345678", "123 Moi Avenue, Apt 4B", "Nairobi");
    api.checkout(customer_id, &request).await.expect("checkout should succeed")
}

pub async fn cod_order(
    db: &SqliteDatabase,
    customer_id: i64,
    hub_id: i64,
    products: &[(&Product, i64)],
) -> (MasterOrder, Vec<SubOrder>) {
    let api = checkout_api(db);
    for (product, quantity) in products {
        api.add_to_cart(customer_id, product.id, *quantity).await.expect("add to cart should succeed");
    }
    let request = CheckoutRequest::cash_on_delivery(hub_id);
    api.checkout(customer_id, &request).await.expect("checkout should succeed")
}
