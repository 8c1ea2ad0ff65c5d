use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{db_types::Product, traits::NewProduct};

pub async fn insert_product(new: &NewProduct, conn: &mut SqliteConnection) -> Result<Product, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO products (merchant_id, name, price, stock_quantity, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(new.merchant_id)
    .bind(&new.name)
    .bind(new.price)
    .bind(new.stock_quantity)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    fetch_product(result.last_insert_rowid(), conn).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        r#"
        SELECT id, merchant_id, name, price, stock_quantity, is_active, created_at, updated_at
        FROM products WHERE id = ?
        "#,
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await
}

/// Atomic check-and-decrement of the stock counter. The stock precondition is part of the UPDATE's WHERE clause, so
/// two concurrent reservations of the last unit cannot both succeed. Returns false when the product is missing or
/// the remaining stock is below `quantity`.
pub async fn reserve_stock(product_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE products SET stock_quantity = stock_quantity - ?, updated_at = ?
        WHERE id = ? AND stock_quantity >= ?
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Returns reserved stock to the shelf. Increments unconditionally.
pub async fn restore_stock(product_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET stock_quantity = stock_quantity + ?, updated_at = ? WHERE id = ?")
        .bind(quantity)
        .bind(Utc::now())
        .bind(product_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
