use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{Refund, RefundStatus};
use sokoni_common::Cents;

const REFUND_COLUMNS: &str = r#"
    id, suborder_id, customer_id, status, reason, amount, transaction_id, processed_at, created_at, updated_at
"#;

pub async fn insert_refund(
    suborder_id: i64,
    customer_id: i64,
    amount: Cents,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Refund, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO refunds (suborder_id, customer_id, status, reason, amount, created_at, updated_at)
        VALUES (?, ?, 'pending', ?, ?, ?, ?)
        "#,
    )
    .bind(suborder_id)
    .bind(customer_id)
    .bind(reason)
    .bind(amount)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    fetch_refund(result.last_insert_rowid(), conn).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn fetch_refund(refund_id: i64, conn: &mut SqliteConnection) -> Result<Option<Refund>, sqlx::Error> {
    sqlx::query_as::<_, Refund>(&format!("SELECT {REFUND_COLUMNS} FROM refunds WHERE id = ?"))
        .bind(refund_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn fetch_refunds(
    status: Option<RefundStatus>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Refund>, sqlx::Error> {
    let mut builder = QueryBuilder::new(format!("SELECT {REFUND_COLUMNS} FROM refunds"));
    if let Some(status) = status {
        builder.push(" WHERE status = ");
        builder.push_bind(status);
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    trace!("📋️ Executing query: {}", builder.sql());
    builder.build_query_as::<Refund>().fetch_all(&mut *conn).await
}

/// The guarded refund-status write. The expected current status is part of the WHERE clause, so concurrent admin
/// actions cannot double-apply a step.
pub async fn update_refund_status(
    refund_id: i64,
    from: RefundStatus,
    to: RefundStatus,
    transaction_id: Option<&str>,
    processed_at: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE refunds SET status = ?, transaction_id = COALESCE(?, transaction_id), processed_at = ?, updated_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(to)
    .bind(transaction_id)
    .bind(processed_at)
    .bind(Utc::now())
    .bind(refund_id)
    .bind(from)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Counts refunds belonging to the given master order that have not yet completed.
pub async fn count_unsettled_refunds_for_order(
    master_order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM refunds r
        INNER JOIN suborders s ON s.id = r.suborder_id
        WHERE s.master_order_id = ? AND r.status != 'completed'
        "#,
    )
    .bind(master_order_id)
    .fetch_one(&mut *conn)
    .await
}
