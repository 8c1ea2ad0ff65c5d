use serde::{Deserialize, Serialize};

use crate::db_types::{MasterOrder, OrderItem, SubOrder};

/// A sub-order together with its line items, as returned to API consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubOrderDetail {
    #[serde(flatten)]
    pub suborder: SubOrder,
    pub items: Vec<OrderItem>,
}

/// A master order with its complete per-merchant fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: MasterOrder,
    pub suborders: Vec<SubOrderDetail>,
}
