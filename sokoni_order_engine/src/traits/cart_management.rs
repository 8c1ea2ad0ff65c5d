use crate::traits::{data_objects::CartView, FulfillmentError};

/// The customer's staging cart. One cart per customer, one line per product; checkout consumes the whole cart.
#[allow(async_fn_in_trait)]
pub trait CartManagement {
    /// Adds a quantity of a product to the customer's cart, creating the cart if necessary. Adding more of a product
    /// that is already in the cart accumulates onto the existing line. The product must be active and the resulting
    /// line quantity must not exceed available stock.
    async fn add_to_cart(&self, customer_id: i64, product_id: i64, quantity: i64)
        -> Result<CartView, FulfillmentError>;

    async fn remove_from_cart(&self, customer_id: i64, product_id: i64) -> Result<CartView, FulfillmentError>;

    async fn fetch_cart(&self, customer_id: i64) -> Result<CartView, FulfillmentError>;
}
