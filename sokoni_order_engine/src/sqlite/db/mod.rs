//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool, or create an atomic transaction as
//! the need arises and call through to the functions without any other changes.
use std::{env, str::FromStr};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod carts;
pub mod hubs;
pub mod orders;
pub mod products;
pub mod refunds;

const SQLITE_DB_URL: &str = "sqlite://data/sokoni.db";

pub fn db_url() -> String {
    let result = env::var("SOKONI_DATABASE_URL").unwrap_or_else(|_| {
        info!("SOKONI_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Creates the order ledger tables if they are not present. Every statement is idempotent, so this can run on every
/// startup.
async fn create_schema(pool: &SqlitePool) -> Result<(), SqlxError> {
    let statements = [
        r#"CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            merchant_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            price INTEGER NOT NULL,
            stock_quantity INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )"#,
        r#"CREATE TABLE IF NOT EXISTS hubs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            city TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        )"#,
        r#"CREATE TABLE IF NOT EXISTS carts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id INTEGER NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )"#,
        r#"CREATE TABLE IF NOT EXISTS cart_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cart_id INTEGER NOT NULL REFERENCES carts (id),
            product_id INTEGER NOT NULL REFERENCES products (id),
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (cart_id, product_id)
        )"#,
        r#"CREATE TABLE IF NOT EXISTS master_orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id INTEGER NOT NULL,
            total_amount INTEGER NOT NULL,
            payment_method TEXT NOT NULL,
            payment_status TEXT NOT NULL DEFAULT 'pending',
            momo_phone TEXT,
            momo_receipt TEXT,
            correlation_id TEXT,
            delivery_address TEXT,
            delivery_city TEXT,
            selected_hub_id INTEGER REFERENCES hubs (id),
            is_cancelled INTEGER NOT NULL DEFAULT 0,
            cancelled_at TEXT,
            cancellation_reason TEXT,
            refund_status TEXT,
            refund_amount INTEGER,
            refund_processed_at TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )"#,
        "CREATE INDEX IF NOT EXISTS idx_master_orders_customer ON master_orders (customer_id)",
        r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_master_orders_correlation
            ON master_orders (correlation_id) WHERE correlation_id IS NOT NULL"#,
        r#"CREATE TABLE IF NOT EXISTS suborders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            master_order_id INTEGER NOT NULL REFERENCES master_orders (id),
            merchant_id INTEGER NOT NULL,
            hub_id INTEGER REFERENCES hubs (id),
            status TEXT NOT NULL,
            subtotal INTEGER NOT NULL,
            commission INTEGER NOT NULL,
            merchant_payout INTEGER NOT NULL,
            pickup_deadline TEXT,
            rejection_reason TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )"#,
        "CREATE INDEX IF NOT EXISTS idx_suborders_master ON suborders (master_order_id)",
        "CREATE INDEX IF NOT EXISTS idx_suborders_merchant ON suborders (merchant_id)",
        "CREATE INDEX IF NOT EXISTS idx_suborders_hub ON suborders (hub_id)",
        r#"CREATE TABLE IF NOT EXISTS order_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            suborder_id INTEGER NOT NULL REFERENCES suborders (id),
            product_id INTEGER NOT NULL REFERENCES products (id),
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            price_at_purchase INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )"#,
        "CREATE INDEX IF NOT EXISTS idx_order_items_suborder ON order_items (suborder_id)",
        r#"CREATE TABLE IF NOT EXISTS refunds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            suborder_id INTEGER NOT NULL UNIQUE REFERENCES suborders (id),
            customer_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            reason TEXT NOT NULL,
            amount INTEGER NOT NULL,
            transaction_id TEXT,
            processed_at TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )"#,
    ];
    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
