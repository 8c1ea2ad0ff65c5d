use std::sync::Arc;

use actix_web::web;
use async_trait::async_trait;
use mockall::mock;
use sokoni_common::Cents;
use sokoni_order_engine::{
    db_types::Role,
    events::EventProducers,
    traits::MarketConfig,
    CheckoutApi,
    OrderFlowApi,
    SqliteDatabase,
};

use crate::{
    auth::{TokenIssuer, TokenVerifier},
    config::AuthConfig,
    integrations::daraja::{PushPaymentClient, PushPaymentError},
    routes::{
        AddToCartRoute,
        CancelOrderRoute,
        CheckoutRoute,
        DarajaCallbackRoute,
        HubOrdersRoute,
        HubPickupRoute,
        HubRejectRoute,
        HubVerifyRoute,
        MerchantUpdateStatusRoute,
        MyOrdersRoute,
        RefundsListRoute,
    },
};

pub const TEST_JWT_SECRET: &str = "endpoint-test-secret-0123456789";

mock! {
    pub Gateway {}

    #[async_trait]
    impl PushPaymentClient for Gateway {
        async fn initiate_push_payment(
            &self,
            phone: &str,
            amount: Cents,
            account_reference: &str,
            description: &str,
        ) -> Result<String, PushPaymentError>;
    }
}

pub async fn new_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("in-memory database should open")
}

pub fn issue_token(user_id: i64, role: Role, hub_id: Option<i64>) -> String {
    TokenIssuer::new(&AuthConfig::new(TEST_JWT_SECRET))
        .issue_token(user_id, role, hub_id)
        .expect("token should issue")
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

/// Configures a test app with the same wiring as the real server, backed by the given database and gateway double.
pub fn configure(
    db: SqliteDatabase,
    gateway: Arc<dyn PushPaymentClient>,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let checkout_api = CheckoutApi::new(db.clone(), MarketConfig::default(), EventProducers::default());
        let flow_api = OrderFlowApi::new(db.clone(), EventProducers::default());
        let verifier = TokenVerifier::new(&AuthConfig::new(TEST_JWT_SECRET));
        cfg.app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(verifier))
            .app_data(web::Data::from(gateway))
            .service(
                web::scope("/api")
                    .service(CheckoutRoute::<SqliteDatabase>::new())
                    .service(MyOrdersRoute::<SqliteDatabase>::new())
                    .service(CancelOrderRoute::<SqliteDatabase>::new())
                    .service(AddToCartRoute::<SqliteDatabase>::new())
                    .service(MerchantUpdateStatusRoute::<SqliteDatabase>::new())
                    .service(HubOrdersRoute::<SqliteDatabase>::new())
                    .service(HubVerifyRoute::<SqliteDatabase>::new())
                    .service(HubRejectRoute::<SqliteDatabase>::new())
                    .service(HubPickupRoute::<SqliteDatabase>::new())
                    .service(RefundsListRoute::<SqliteDatabase>::new()),
            )
            .service(web::scope("/gateway").service(DarajaCallbackRoute::<SqliteDatabase>::new()));
    }
}
