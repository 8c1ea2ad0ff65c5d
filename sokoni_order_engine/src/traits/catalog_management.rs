use crate::{
    db_types::{Hub, Product},
    traits::{
        data_objects::{NewHub, NewProduct},
        FulfillmentError,
    },
};

/// The catalog collaborator boundary: product and hub lookups, plus the stock counter the order engine owns.
///
/// Catalog curation (names, descriptions, images, pricing policy) lives elsewhere; the insert methods here exist so
/// that deployments and tests can seed collaborator data.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, FulfillmentError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, FulfillmentError>;

    async fn insert_hub(&self, hub: NewHub) -> Result<Hub, FulfillmentError>;

    async fn fetch_hub(&self, hub_id: i64) -> Result<Option<Hub>, FulfillmentError>;

    /// Returns stock to the shelf. Used by cancellation; increments unconditionally.
    async fn restore_stock(&self, product_id: i64, quantity: i64) -> Result<(), FulfillmentError>;
}
