use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use daraja::DarajaApi;
use log::*;
use sokoni_order_engine::{events::EventProducers, CheckoutApi, OrderFlowApi, SqliteDatabase};

use crate::{
    auth::TokenVerifier,
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::daraja::PushPaymentClient,
    routes::{
        health,
        not_found,
        AddToCartRoute,
        CancelOrderRoute,
        CheckoutRoute,
        DarajaCallbackRoute,
        HubOrdersRoute,
        HubPickupRoute,
        HubRejectRoute,
        HubVerifyRoute,
        MerchantOrderByIdRoute,
        MerchantOrdersRoute,
        MerchantUpdateStatusRoute,
        MyCartRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        RefundCompleteRoute,
        RefundFailRoute,
        RefundProcessRoute,
        RefundsListRoute,
        RemoveFromCartRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = DarajaApi::new(config.daraja.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let producers = EventProducers::default();
    let _expiry_worker = start_expiry_worker(db.clone(), producers.clone(), config.expiry_check_interval);
    let srv = create_server_instance(config, db, Arc::new(gateway), producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: Arc<dyn PushPaymentClient>,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let checkout_api = CheckoutApi::new(db.clone(), config.market, producers.clone());
        let flow_api = OrderFlowApi::new(db.clone(), producers.clone());
        let verifier = TokenVerifier::new(&config.auth);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sokoni::access_log"))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(verifier))
            .app_data(web::Data::from(gateway.clone()));
        // Routes that require authentication. Each route's ACL names the roles it accepts.
        let api_scope = web::scope("/api")
            .service(CheckoutRoute::<SqliteDatabase>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(MyCartRoute::<SqliteDatabase>::new())
            .service(AddToCartRoute::<SqliteDatabase>::new())
            .service(RemoveFromCartRoute::<SqliteDatabase>::new())
            .service(MerchantOrdersRoute::<SqliteDatabase>::new())
            .service(MerchantOrderByIdRoute::<SqliteDatabase>::new())
            .service(MerchantUpdateStatusRoute::<SqliteDatabase>::new())
            .service(HubOrdersRoute::<SqliteDatabase>::new())
            .service(HubVerifyRoute::<SqliteDatabase>::new())
            .service(HubRejectRoute::<SqliteDatabase>::new())
            .service(HubPickupRoute::<SqliteDatabase>::new())
            .service(RefundsListRoute::<SqliteDatabase>::new())
            .service(RefundProcessRoute::<SqliteDatabase>::new())
            .service(RefundCompleteRoute::<SqliteDatabase>::new())
            .service(RefundFailRoute::<SqliteDatabase>::new());
        // The gateway posts payment results here; there is no authenticated caller on this path.
        let gateway_scope = web::scope("/gateway").service(DarajaCallbackRoute::<SqliteDatabase>::new());
        app.service(health)
            .service(api_scope)
            .service(gateway_scope)
            .default_service(web::route().to(not_found))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    info!("🚀️ Order server listening on {host}:{port}");
    Ok(srv)
}
