//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause
//! the current worker to stop processing new requests. For this reason, any long, non-cpu-bound operation (e.g. I/O,
//! database operations, etc.) should be expressed as futures or asynchronous functions. Async handlers get executed
//! concurrently by worker threads and thus don't block execution.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use serde_json::json;
use sokoni_order_engine::{
    db_types::{PaymentMethod, Role},
    traits::{CheckoutRequest, MarketDatabase, PaymentCallback},
    CheckoutApi,
    OrderFlowApi,
};

use crate::{
    auth::JwtClaims,
    data_objects::{
        AddToCartRequest,
        CancelOrderRequest,
        CompleteRefundRequest,
        HubOrdersQuery,
        JsonResponse,
        PickupRequest,
        RefundsQuery,
        RejectDeliveryRequest,
        StatusUpdateRequest,
    },
    errors::{AuthError, ServerError},
    integrations::daraja::PushPaymentClient,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/orders" impl MarketDatabase where requires [Role::Customer]);
/// Creates an order from the customer's cart.
///
/// The assembly itself is atomic. For mobile-money orders the push payment is initiated *after* the order has
/// committed; if the gateway refuses, the order is kept in a payment-failed state rather than rolled back, so the
/// customer can retry the payment without rebuilding their cart.
pub async fn checkout<B: MarketDatabase>(
    claims: JwtClaims,
    body: web::Json<CheckoutRequest>,
    api: web::Data<CheckoutApi<B>>,
    flow: web::Data<OrderFlowApi<B>>,
    gateway: web::Data<dyn PushPaymentClient>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST checkout for customer #{}", claims.sub);
    let (order, suborders) = api.checkout(claims.sub, &request).await?;
    if order.payment_method == PaymentMethod::MobileMoneyDelivery {
        let phone = order.momo_phone.clone().unwrap_or_default();
        let reference = format!("ORDER-{}", order.id);
        let description = format!("Payment for order #{}", order.id);
        match gateway.initiate_push_payment(&phone, order.total_amount, &reference, &description).await {
            Ok(correlation_id) => {
                let order = flow.record_payment_request(order.id, &correlation_id).await?;
                return Ok(HttpResponse::Created().json(json!({
                    "order": order,
                    "suborders": suborders,
                    "payment_prompt": "Please approve the payment request on your phone",
                })));
            },
            Err(e) => {
                warn!("💻️ Push payment initiation for order #{} failed: {e}", order.id);
                let order = flow.record_payment_initiation_failure(order.id).await?;
                return Err(ServerError::GatewayError(format!(
                    "Order #{} was created but the payment could not be initiated. Please retry the payment.",
                    order.id
                )));
            },
        }
    }
    Ok(HttpResponse::Created().json(json!({ "order": order, "suborders": suborders })))
}

//----------------------------------------------   Customer orders  ---------------------------------------------
route!(my_orders => Get "/orders" impl MarketDatabase where requires [Role::Customer]);
pub async fn my_orders<B: MarketDatabase>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET orders for customer #{}", claims.sub);
    let orders = api.orders_for_customer(claims.sub).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{id}" impl MarketDatabase where requires [Role::Customer]);
pub async fn order_by_id<B: MarketDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let order = api.order_for_customer(claims.sub, order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/orders/{id}/cancel" impl MarketDatabase where requires [Role::Customer]);
pub async fn cancel_order<B: MarketDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<CancelOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST cancel order #{order_id} for customer #{}", claims.sub);
    let outcome = api.cancel_order_as_customer(claims.sub, order_id, &body.reason).await?;
    Ok(HttpResponse::Ok().json(json!({
        "order": outcome.order,
        "suborders": outcome.suborders,
        "refunds": outcome.refunds,
    })))
}

//----------------------------------------------      Cart     --------------------------------------------------
route!(my_cart => Get "/cart" impl MarketDatabase where requires [Role::Customer]);
pub async fn my_cart<B: MarketDatabase>(
    claims: JwtClaims,
    api: web::Data<CheckoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let cart = api.fetch_cart(claims.sub).await?;
    Ok(HttpResponse::Ok().json(cart))
}

route!(add_to_cart => Post "/cart" impl MarketDatabase where requires [Role::Customer]);
pub async fn add_to_cart<B: MarketDatabase>(
    claims: JwtClaims,
    body: web::Json<AddToCartRequest>,
    api: web::Data<CheckoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let cart = api.add_to_cart(claims.sub, body.product_id, body.quantity).await?;
    Ok(HttpResponse::Ok().json(cart))
}

route!(remove_from_cart => Delete "/cart/{product_id}" impl MarketDatabase where requires [Role::Customer]);
pub async fn remove_from_cart<B: MarketDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<CheckoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let cart = api.remove_from_cart(claims.sub, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(cart))
}

//----------------------------------------------   Merchant orders  ---------------------------------------------
route!(merchant_orders => Get "/merchant/orders" impl MarketDatabase where requires [Role::Merchant]);
pub async fn merchant_orders<B: MarketDatabase>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET orders for merchant #{}", claims.sub);
    let suborders = api.suborders_for_merchant(claims.sub).await?;
    Ok(HttpResponse::Ok().json(suborders))
}

route!(merchant_order_by_id => Get "/merchant/orders/{id}" impl MarketDatabase where requires [Role::Merchant]);
pub async fn merchant_order_by_id<B: MarketDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let suborder = api.suborder_for_merchant(claims.sub, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(suborder))
}

route!(merchant_update_status => Post "/merchant/orders/{id}/status" impl MarketDatabase where requires [Role::Merchant]);
/// A merchant's explicit status update: the courier progression (shipped → in transit → delivered) or marking goods
/// dropped off at the hub. Anything off the transition table is a 409.
pub async fn merchant_update_status<B: MarketDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let suborder_id = path.into_inner();
    debug!("💻️ POST status update for sub-order #{suborder_id} to {} by merchant #{}", body.status, claims.sub);
    let suborder = api.update_status_as_merchant(claims.sub, suborder_id, body.status).await?;
    Ok(HttpResponse::Ok().json(suborder))
}

//----------------------------------------------   Hub workflow  ------------------------------------------------
route!(hub_orders => Get "/hub/orders" impl MarketDatabase where requires [Role::HubStaff]);
pub async fn hub_orders<B: MarketDatabase>(
    claims: JwtClaims,
    query: web::Query<HubOrdersQuery>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let hub_id = assigned_hub(&claims)?;
    let suborders = api.suborders_for_hub(hub_id, query.status).await?;
    Ok(HttpResponse::Ok().json(suborders))
}

route!(hub_verify => Post "/hub/orders/{id}/verify" impl MarketDatabase where requires [Role::HubStaff]);
pub async fn hub_verify<B: MarketDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let hub_id = assigned_hub(&claims)?;
    let suborder = api.hub_accept_delivery(hub_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(suborder))
}

route!(hub_reject => Post "/hub/orders/{id}/reject" impl MarketDatabase where requires [Role::HubStaff]);
pub async fn hub_reject<B: MarketDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<RejectDeliveryRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let hub_id = assigned_hub(&claims)?;
    let suborder = api.hub_reject_delivery(hub_id, path.into_inner(), &body.rejection_reason).await?;
    Ok(HttpResponse::Ok().json(suborder))
}

route!(hub_pickup => Post "/hub/orders/{id}/pickup" impl MarketDatabase where requires [Role::HubStaff]);
pub async fn hub_pickup<B: MarketDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<PickupRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let hub_id = assigned_hub(&claims)?;
    let suborder = api.hub_complete_pickup(hub_id, path.into_inner(), body.payment_received).await?;
    Ok(HttpResponse::Ok().json(suborder))
}

fn assigned_hub(claims: &JwtClaims) -> Result<i64, ServerError> {
    claims.hub_id.ok_or(ServerError::AuthenticationError(AuthError::NoHubAssigned))
}

//----------------------------------------------   Admin refunds  -----------------------------------------------
route!(refunds_list => Get "/admin/refunds" impl MarketDatabase where requires [Role::Admin]);
pub async fn refunds_list<B: MarketDatabase>(
    query: web::Query<RefundsQuery>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let refunds = api.refunds(query.status).await?;
    Ok(HttpResponse::Ok().json(refunds))
}

route!(refund_process => Post "/admin/refunds/{id}/process" impl MarketDatabase where requires [Role::Admin]);
pub async fn refund_process<B: MarketDatabase>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let refund = api.start_refund_processing(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(refund))
}

route!(refund_complete => Post "/admin/refunds/{id}/complete" impl MarketDatabase where requires [Role::Admin]);
pub async fn refund_complete<B: MarketDatabase>(
    path: web::Path<i64>,
    body: web::Json<CompleteRefundRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let refund = api.complete_refund(path.into_inner(), &body.transaction_id).await?;
    Ok(HttpResponse::Ok().json(refund))
}

route!(refund_fail => Post "/admin/refunds/{id}/fail" impl MarketDatabase where requires [Role::Admin]);
pub async fn refund_fail<B: MarketDatabase>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let refund = api.fail_refund(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(refund))
}

//----------------------------------------------   Gateway callback  --------------------------------------------
route!(daraja_callback => Post "/daraja/callback" impl MarketDatabase);
/// The gateway's asynchronous payment result. There is no caller waiting on this: every classifiable envelope is
/// acknowledged with the gateway's expected `ResultCode: 0` body — including duplicates and correlation ids we do
/// not recognise — because the gateway must never be told to keep retrying.
pub async fn daraja_callback<B: MarketDatabase>(
    body: web::Json<serde_json::Value>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received payment gateway callback");
    let outcome = match daraja::classify_callback(&body) {
        Ok(outcome) => outcome,
        Err(e) => {
            // Nothing to correlate against. Acknowledge so the gateway gives up on this delivery.
            error!("💻️ Could not classify payment callback: {e}");
            return Ok(callback_ack());
        },
    };
    let callback = match outcome {
        daraja::CallbackOutcome::Success { correlation_id, receipt_number, .. } => {
            PaymentCallback::Success { correlation_id, receipt: receipt_number }
        },
        daraja::CallbackOutcome::Failure { correlation_id, result_desc, .. } => {
            PaymentCallback::Failure { correlation_id, description: result_desc }
        },
    };
    api.process_payment_callback(&callback).await?;
    Ok(callback_ack())
}

fn callback_ack() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "ResultCode": 0, "ResultDesc": "Accepted" }))
}

//----------------------------------------------   Fallback  ----------------------------------------------------
pub async fn not_found() -> Result<HttpResponse, ServerError> {
    Ok(HttpResponse::NotFound().json(JsonResponse::failure("The resource you requested does not exist")))
}
