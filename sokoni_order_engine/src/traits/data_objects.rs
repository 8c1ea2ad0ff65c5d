use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sokoni_common::Cents;

use crate::db_types::{CartLine, MasterOrder, PaymentMethod, Refund, SubOrder};

//--------------------------------------    MarketConfig     ---------------------------------------------------------
/// Marketplace policy knobs, injected into the checkout API at construction time.
#[derive(Debug, Clone, Copy)]
pub struct MarketConfig {
    /// The platform's cut of every sub-order subtotal, in basis points.
    pub commission_rate_bps: u32,
    /// How long a cash-on-delivery order waits at the hub before it expires.
    pub pickup_window_days: i64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self { commission_rate_bps: 2500, pickup_window_days: 5 }
    }
}

impl MarketConfig {
    pub fn pickup_deadline_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.pickup_window_days)
    }
}

//--------------------------------------    CheckoutRequest     ---------------------------------------------------------
/// The payment-method-specific details a customer submits at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
    pub momo_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub delivery_city: Option<String>,
    pub hub_id: Option<i64>,
}

impl CheckoutRequest {
    pub fn mobile_money(phone: &str, address: &str, city: &str) -> Self {
        Self {
            payment_method: PaymentMethod::MobileMoneyDelivery,
            momo_phone: Some(phone.to_string()),
            delivery_address: Some(address.to_string()),
            delivery_city: Some(city.to_string()),
            hub_id: None,
        }
    }

    pub fn cash_on_delivery(hub_id: i64) -> Self {
        Self {
            payment_method: PaymentMethod::CashOnDelivery,
            momo_phone: None,
            delivery_address: None,
            delivery_city: None,
            hub_id: Some(hub_id),
        }
    }

    /// Checks that the fields required by the chosen payment method are present, and that fields belonging to the
    /// other track are absent. A master order holds either a delivery address or a hub, never both.
    pub fn validate(&self) -> Result<(), String> {
        match self.payment_method {
            PaymentMethod::MobileMoneyDelivery => {
                if self.momo_phone.as_deref().map_or(true, str::is_empty) ||
                    self.delivery_address.as_deref().map_or(true, str::is_empty) ||
                    self.delivery_city.as_deref().map_or(true, str::is_empty)
                {
                    return Err("Mobile-money payment requires a phone number, delivery address and city".to_string());
                }
                if self.hub_id.is_some() {
                    return Err("A hub cannot be selected for a delivery order".to_string());
                }
            },
            PaymentMethod::CashOnDelivery => {
                if self.hub_id.is_none() {
                    return Err("Cash-on-delivery requires a pickup hub".to_string());
                }
                if self.delivery_address.is_some() || self.delivery_city.is_some() {
                    return Err("A delivery address cannot be given for a hub pickup order".to_string());
                }
            },
        }
        Ok(())
    }
}

//--------------------------------------   PaymentCallback   ---------------------------------------------------------
/// A gateway payment callback, reduced to what reconciliation needs. The gateway adapter is responsible for
/// defensively extracting this from the raw callback envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentCallback {
    Success { correlation_id: String, receipt: String },
    Failure { correlation_id: String, description: String },
}

impl PaymentCallback {
    pub fn correlation_id(&self) -> &str {
        match self {
            PaymentCallback::Success { correlation_id, .. } => correlation_id,
            PaymentCallback::Failure { correlation_id, .. } => correlation_id,
        }
    }
}

//-------------------------------------- CallbackResolution  ---------------------------------------------------------
/// What reconciliation did with a payment callback. Every variant is an acknowledged outcome — callbacks are
/// fire-and-forget from the gateway's point of view and must never be answered with "retry".
#[derive(Debug, Clone)]
pub enum CallbackResolution {
    /// The order and all of its sub-orders were moved to paid.
    PaymentApplied { order: MasterOrder, suborders: Vec<SubOrder> },
    /// The order was marked payment-failed. Sub-orders are left untouched so the customer can retry.
    PaymentFailed { order: MasterOrder },
    /// A success callback arrived for an order that is already paid. No mutation.
    DuplicateSuccess { order_id: i64 },
    /// A success callback arrived after the order was cancelled. The cancellation wins; no revival.
    SupersededByCancellation { order_id: i64 },
    /// A failure callback arrived for an order that is no longer pending. No mutation.
    Ignored { order_id: i64 },
    /// No order matches the correlation id. Acknowledged so the gateway stops retrying.
    Unmatched { correlation_id: String },
}

//-------------------------------------- CancellationOutcome ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct CancellationOutcome {
    pub order: MasterOrder,
    pub suborders: Vec<SubOrder>,
    /// Refunds opened by this cancellation. Empty unless the order had already been paid.
    pub refunds: Vec<Refund>,
}

//--------------------------------------    ExpiryResult     ---------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct ExpiryResult {
    /// Sub-orders the sweep moved to `Expired`.
    pub expired: Vec<SubOrder>,
}

impl ExpiryResult {
    pub fn count(&self) -> usize {
        self.expired.len()
    }
}

//--------------------------------------      CartView       ---------------------------------------------------------
/// A customer-facing snapshot of a cart with computed totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total: Cents,
}

impl CartView {
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let total = lines.iter().map(CartLine::line_total).sum();
        Self { lines, total }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

//--------------------------------------     NewProduct      ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub merchant_id: i64,
    pub name: String,
    pub price: Cents,
    pub stock_quantity: i64,
}

//--------------------------------------       NewHub        ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHub {
    pub name: String,
    pub city: String,
}
