use serde::{Deserialize, Serialize};

use crate::db_types::{MasterOrder, SubOrder, SubOrderStatus};

/// Emitted when checkout commits. Carries the full fan-out so notification handlers can address every merchant
/// involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: MasterOrder,
    pub suborders: Vec<SubOrder>,
}

/// Emitted when a payment callback is reconciled successfully and the order flips to paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmedEvent {
    pub order: MasterOrder,
    pub suborders: Vec<SubOrder>,
}

/// Emitted on every individual sub-order status change (shipping updates, hub verification, pickup completion,
/// expiry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedEvent {
    pub suborder: SubOrder,
    pub previous: SubOrderStatus,
}

impl StatusChangedEvent {
    pub fn new(suborder: SubOrder, previous: SubOrderStatus) -> Self {
        Self { suborder, previous }
    }
}

/// Emitted when a master order is cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order: MasterOrder,
    pub reason: String,
}

/// Emitted when hub staff reject a merchant's dropped-off goods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubRejectedEvent {
    pub suborder: SubOrder,
    pub reason: String,
}
