use std::fmt::Display;

use serde::{Deserialize, Serialize};
use sokoni_order_engine::db_types::SubOrderStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: SubOrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectDeliveryRequest {
    pub rejection_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupRequest {
    /// The hub staff's explicit confirmation that the cash changed hands.
    pub payment_received: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRefundRequest {
    /// The mobile-money transaction id of the manual payout.
    pub transaction_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubOrdersQuery {
    pub status: Option<SubOrderStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefundsQuery {
    pub status: Option<sokoni_order_engine::db_types::RefundStatus>,
}
