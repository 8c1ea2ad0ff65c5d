//! Database backend contracts for the order engine.
//!
//! Backends implement these traits to drive the order flows:
//! * [`FulfillmentDatabase`] — checkout assembly, payment reconciliation, status transitions, cancellation/refunds
//!   and pickup-deadline expiry. Every method that touches more than one row runs as a single atomic transaction.
//! * [`CatalogManagement`] — the read side of the catalog collaborator (products, hubs) plus the atomic stock
//!   counter the engine owns.
//! * [`CartManagement`] — the customer's staging cart that checkout consumes.
mod cart_management;
mod catalog_management;
mod data_objects;
mod fulfillment_database;

pub use cart_management::CartManagement;
pub use catalog_management::CatalogManagement;
pub use data_objects::{
    CallbackResolution,
    CancellationOutcome,
    CartView,
    CheckoutRequest,
    ExpiryResult,
    MarketConfig,
    NewHub,
    NewProduct,
    PaymentCallback,
};
pub use fulfillment_database::{FulfillmentDatabase, FulfillmentError};

/// Umbrella trait for backends that implement the full engine surface. Generic consumers (the HTTP handlers in
/// particular) bound on this instead of spelling the three traits out.
pub trait MarketDatabase: FulfillmentDatabase + CartManagement + CatalogManagement {}

impl<T> MarketDatabase for T where T: FulfillmentDatabase + CartManagement + CatalogManagement {}
