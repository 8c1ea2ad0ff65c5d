//! Sokoni Order Engine
//!
//! The order engine is the fulfillment and payment-reconciliation core of the Sokoni marketplace. It turns a
//! customer's cart into one master order plus one sub-order per merchant, tracks each sub-order through its delivery
//! pipeline (mobile-money with courier delivery, or cash-on-delivery through a pickup hub), reconciles asynchronous
//! payment callbacks, and handles cancellation, stock restoration and refunds.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@traits`] and the SQLite backend). You should never need to access the
//!    database directly; use the public APIs instead. The exception is the data types used in the database, which are
//!    defined in the `db_types` module and are public.
//! 2. The engine public API: [`CheckoutApi`] assembles orders from carts, and [`OrderFlowApi`] drives every
//!    subsequent status change — payment reconciliation, merchant shipping updates, the hub pickup workflow,
//!    cancellation/refunds and pickup-deadline expiry.
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted when certain actions
//! occur within the engine, for example an `OrderCreated` event when checkout succeeds. A simple actor framework is
//! used so that notification senders can hook into these events without being able to affect the order flow.
pub mod db_types;
pub mod events;
pub mod transitions;
pub mod traits;

mod soe_api;
mod sqlite;

pub use soe_api::{
    checkout_api::CheckoutApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    order_objects::{OrderDetail, SubOrderDetail},
};
pub use sqlite::SqliteDatabase;
pub use traits::{CartManagement, CatalogManagement, FulfillmentDatabase, FulfillmentError, MarketDatabase};
