use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db_types::CartLine;

pub async fn fetch_or_create_cart(customer_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM carts WHERE customer_id = ?")
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO carts (customer_id, created_at, updated_at) VALUES (?, ?, ?)")
        .bind(customer_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn line_quantity(
    cart_id: i64,
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let quantity =
        sqlx::query_scalar::<_, i64>("SELECT quantity FROM cart_items WHERE cart_id = ? AND product_id = ?")
            .bind(cart_id)
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(quantity.unwrap_or(0))
}

/// Adds to the cart line for the product, accumulating onto an existing line if there is one. The (cart, product)
/// pair is unique.
pub async fn upsert_line(
    cart_id: i64,
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO cart_items (cart_id, product_id, quantity, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (cart_id, product_id)
        DO UPDATE SET quantity = quantity + excluded.quantity, updated_at = excluded.updated_at
        "#,
    )
    .bind(cart_id)
    .bind(product_id)
    .bind(quantity)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn remove_line(cart_id: i64, product_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = ? AND product_id = ?")
        .bind(cart_id)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Fetches the customer's cart lines joined with the product fields checkout validates against. Lines are ordered by
/// merchant so the per-merchant grouping downstream is deterministic.
pub async fn fetch_lines(customer_id: i64, conn: &mut SqliteConnection) -> Result<Vec<CartLine>, sqlx::Error> {
    sqlx::query_as::<_, CartLine>(
        r#"
        SELECT
            ci.product_id AS product_id,
            p.name AS name,
            p.merchant_id AS merchant_id,
            p.price AS unit_price,
            ci.quantity AS quantity,
            p.stock_quantity AS stock_quantity,
            p.is_active AS is_active
        FROM cart_items ci
        INNER JOIN carts c ON c.id = ci.cart_id
        INNER JOIN products p ON p.id = ci.product_id
        WHERE c.customer_id = ?
        ORDER BY p.merchant_id ASC, ci.product_id ASC
        "#,
    )
    .bind(customer_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn clear_cart(cart_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = ?").bind(cart_id).execute(&mut *conn).await?;
    Ok(())
}
