use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sokoni_common::Cents;
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------        Role        ----------------------------------------------------------
/// The actor roles the identity service can place in an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Merchant,
    HubStaff,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Merchant => write!(f, "merchant"),
            Role::HubStaff => write!(f, "hub_staff"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "merchant" => Ok(Self::Merchant),
            "hub_staff" => Ok(Self::HubStaff),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------    PaymentMethod    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Mobile-money push payment up front, goods couriered to the customer's address.
    MobileMoneyDelivery,
    /// Cash handed over at a pickup hub when the customer collects the goods.
    CashOnDelivery,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::MobileMoneyDelivery => write!(f, "mobile_money_delivery"),
            PaymentMethod::CashOnDelivery => write!(f, "cash_on_delivery"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile_money_delivery" => Ok(Self::MobileMoneyDelivery),
            "cash_on_delivery" => Ok(Self::CashOnDelivery),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------    PaymentStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Refunded => write!(f, "refunded"),
        }
    }
}

//--------------------------------------    SubOrderStatus   ---------------------------------------------------------
/// Every state a sub-order can be in, across both delivery tracks.
///
/// The legal movements between these states are defined in the [`crate::transitions`] table; nothing else in the
/// engine is allowed to write a status column except through that table's checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubOrderStatus {
    // Mobile-money track
    PendingPayment,
    PaidAwaitingShipment,
    Shipped,
    InTransit,
    Delivered,
    // Cash-on-delivery track
    PendingMerchantDelivery,
    AtHubVerificationPending,
    AtHubReadyForPickup,
    // Terminal states shared by both tracks
    Completed,
    Cancelled,
    Expired,
}

impl SubOrderStatus {
    pub const ALL: [SubOrderStatus; 11] = [
        SubOrderStatus::PendingPayment,
        SubOrderStatus::PaidAwaitingShipment,
        SubOrderStatus::Shipped,
        SubOrderStatus::InTransit,
        SubOrderStatus::Delivered,
        SubOrderStatus::PendingMerchantDelivery,
        SubOrderStatus::AtHubVerificationPending,
        SubOrderStatus::AtHubReadyForPickup,
        SubOrderStatus::Completed,
        SubOrderStatus::Cancelled,
        SubOrderStatus::Expired,
    ];
}

impl Display for SubOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubOrderStatus::PendingPayment => "pending_payment",
            SubOrderStatus::PaidAwaitingShipment => "paid_awaiting_shipment",
            SubOrderStatus::Shipped => "shipped",
            SubOrderStatus::InTransit => "in_transit",
            SubOrderStatus::Delivered => "delivered",
            SubOrderStatus::PendingMerchantDelivery => "pending_merchant_delivery",
            SubOrderStatus::AtHubVerificationPending => "at_hub_verification_pending",
            SubOrderStatus::AtHubReadyForPickup => "at_hub_ready_for_pickup",
            SubOrderStatus::Completed => "completed",
            SubOrderStatus::Cancelled => "cancelled",
            SubOrderStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SubOrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(Self::PendingPayment),
            "paid_awaiting_shipment" => Ok(Self::PaidAwaitingShipment),
            "shipped" => Ok(Self::Shipped),
            "in_transit" => Ok(Self::InTransit),
            "delivered" => Ok(Self::Delivered),
            "pending_merchant_delivery" => Ok(Self::PendingMerchantDelivery),
            "at_hub_verification_pending" => Ok(Self::AtHubVerificationPending),
            "at_hub_ready_for_pickup" => Ok(Self::AtHubReadyForPickup),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            s => Err(ConversionError(format!("Invalid sub-order status: {s}"))),
        }
    }
}

//--------------------------------------    RefundStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundStatus::Pending => write!(f, "pending"),
            RefundStatus::Processing => write!(f, "processing"),
            RefundStatus::Completed => write!(f, "completed"),
            RefundStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RefundStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid refund status: {s}"))),
        }
    }
}

//--------------------------------------      Product        ---------------------------------------------------------
/// A snapshot of a catalog product. The catalog itself is maintained elsewhere; the order engine only reads prices
/// and activity flags and owns the stock counter.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub merchant_id: i64,
    pub name: String,
    pub price: Cents,
    pub stock_quantity: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        Hub          ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Hub {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub is_active: bool,
}

//--------------------------------------      CartLine       ---------------------------------------------------------
/// One line of a customer's cart, joined with the product fields checkout needs to validate it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    pub name: String,
    pub merchant_id: i64,
    pub unit_price: Cents,
    pub quantity: i64,
    pub stock_quantity: i64,
    pub is_active: bool,
}

impl CartLine {
    pub fn line_total(&self) -> Cents {
        self.unit_price * self.quantity
    }
}

//--------------------------------------     MasterOrder     ---------------------------------------------------------
/// The complete checkout transaction for one customer, possibly spanning several merchants.
///
/// Exactly one of the delivery address and the selected hub is populated, matching the payment method. Master orders
/// are never deleted; cancellation is a flag, not a removal.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MasterOrder {
    pub id: i64,
    pub customer_id: i64,
    pub total_amount: Cents,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    /// The phone number the mobile-money push payment was sent to.
    pub momo_phone: Option<String>,
    /// The gateway receipt number, recorded when the payment callback confirms success.
    pub momo_receipt: Option<String>,
    /// The gateway-issued id that ties the asynchronous payment callback back to this order.
    pub correlation_id: Option<String>,
    pub delivery_address: Option<String>,
    pub delivery_city: Option<String>,
    pub selected_hub_id: Option<i64>,
    pub is_cancelled: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub refund_status: Option<RefundStatus>,
    pub refund_amount: Option<Cents>,
    pub refund_processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      SubOrder       ---------------------------------------------------------
/// The portion of a master order fulfilled by a single merchant. This is the unit that moves through the status
/// pipeline.
///
/// `commission + merchant_payout == subtotal` holds exactly; all three are written together at checkout and never
/// modified afterwards.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SubOrder {
    pub id: i64,
    pub master_order_id: i64,
    pub merchant_id: i64,
    /// Populated for cash-on-delivery sub-orders only.
    pub hub_id: Option<i64>,
    pub status: SubOrderStatus,
    pub subtotal: Cents,
    pub commission: Cents,
    pub merchant_payout: Cents,
    /// Cash-on-delivery only: the moment after which an uncollected, hub-ready sub-order expires.
    pub pickup_deadline: Option<DateTime<Utc>>,
    /// Set when hub staff reject the goods a merchant dropped off.
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      OrderItem      ---------------------------------------------------------
/// A product line within a sub-order. The price is snapshotted at purchase time and immutable from then on, so later
/// catalog price changes cannot rewrite history.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub suborder_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub price_at_purchase: Cents,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn line_total(&self) -> Cents {
        self.price_at_purchase * self.quantity
    }
}

//--------------------------------------       Refund        ---------------------------------------------------------
/// The refund owed for one cancelled, already-paid sub-order. At most one refund exists per sub-order.
///
/// Refunds are created `pending` by the cancellation flow and move through `processing` to `completed` or `failed`
/// only by explicit admin action. There is no automatic payout.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Refund {
    pub id: i64,
    pub suborder_id: i64,
    pub customer_id: i64,
    pub status: RefundStatus,
    pub reason: String,
    pub amount: Cents,
    /// The mobile-money transaction id of the payout, recorded when an admin completes the refund.
    pub transaction_id: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
