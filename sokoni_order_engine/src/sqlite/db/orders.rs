use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{MasterOrder, OrderItem, SubOrder, SubOrderStatus},
    traits::CheckoutRequest,
};
use sokoni_common::Cents;

const MASTER_ORDER_COLUMNS: &str = r#"
    id, customer_id, total_amount, payment_method, payment_status, momo_phone, momo_receipt, correlation_id,
    delivery_address, delivery_city, selected_hub_id, is_cancelled, cancelled_at, cancellation_reason,
    refund_status, refund_amount, refund_processed_at, created_at, updated_at
"#;

const SUBORDER_COLUMNS: &str = r#"
    id, master_order_id, merchant_id, hub_id, status, subtotal, commission, merchant_payout, pickup_deadline,
    rejection_reason, created_at, updated_at
"#;

//--------------------------------------      Inserts        ---------------------------------------------------------

pub async fn insert_master_order(
    customer_id: i64,
    total: Cents,
    request: &CheckoutRequest,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO master_orders (
            customer_id, total_amount, payment_method, payment_status, momo_phone, delivery_address, delivery_city,
            selected_hub_id, created_at, updated_at
        ) VALUES (?, ?, ?, 'pending', ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(customer_id)
    .bind(total)
    .bind(request.payment_method)
    .bind(&request.momo_phone)
    .bind(&request.delivery_address)
    .bind(&request.delivery_city)
    .bind(request.hub_id)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_suborder(
    master_order_id: i64,
    merchant_id: i64,
    hub_id: Option<i64>,
    status: SubOrderStatus,
    subtotal: Cents,
    commission: Cents,
    merchant_payout: Cents,
    pickup_deadline: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO suborders (
            master_order_id, merchant_id, hub_id, status, subtotal, commission, merchant_payout, pickup_deadline,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(master_order_id)
    .bind(merchant_id)
    .bind(hub_id)
    .bind(status)
    .bind(subtotal)
    .bind(commission)
    .bind(merchant_payout)
    .bind(pickup_deadline)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn insert_order_item(
    suborder_id: i64,
    product_id: i64,
    quantity: i64,
    price_at_purchase: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO order_items (suborder_id, product_id, quantity, price_at_purchase, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(suborder_id)
    .bind(product_id)
    .bind(quantity)
    .bind(price_at_purchase)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

//--------------------------------------      Fetches        ---------------------------------------------------------

pub async fn fetch_master_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<MasterOrder>, sqlx::Error> {
    sqlx::query_as::<_, MasterOrder>(&format!("SELECT {MASTER_ORDER_COLUMNS} FROM master_orders WHERE id = ?"))
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn fetch_master_order_by_correlation(
    correlation_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<MasterOrder>, sqlx::Error> {
    sqlx::query_as::<_, MasterOrder>(&format!(
        "SELECT {MASTER_ORDER_COLUMNS} FROM master_orders WHERE correlation_id = ?"
    ))
    .bind(correlation_id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn fetch_orders_for_customer(
    customer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<MasterOrder>, sqlx::Error> {
    sqlx::query_as::<_, MasterOrder>(&format!(
        "SELECT {MASTER_ORDER_COLUMNS} FROM master_orders WHERE customer_id = ? ORDER BY created_at DESC, id DESC"
    ))
    .bind(customer_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn fetch_suborder(suborder_id: i64, conn: &mut SqliteConnection) -> Result<Option<SubOrder>, sqlx::Error> {
    sqlx::query_as::<_, SubOrder>(&format!("SELECT {SUBORDER_COLUMNS} FROM suborders WHERE id = ?"))
        .bind(suborder_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn fetch_suborders_for_order(
    master_order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<SubOrder>, sqlx::Error> {
    sqlx::query_as::<_, SubOrder>(&format!(
        "SELECT {SUBORDER_COLUMNS} FROM suborders WHERE master_order_id = ? ORDER BY id ASC"
    ))
    .bind(master_order_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn fetch_suborders_for_merchant(
    merchant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<SubOrder>, sqlx::Error> {
    sqlx::query_as::<_, SubOrder>(&format!(
        "SELECT {SUBORDER_COLUMNS} FROM suborders WHERE merchant_id = ? ORDER BY created_at DESC, id DESC"
    ))
    .bind(merchant_id)
    .fetch_all(&mut *conn)
    .await
}

/// Fetches sub-orders routed to the given hub, optionally narrowed to a single status.
pub async fn fetch_suborders_for_hub(
    hub_id: i64,
    status: Option<SubOrderStatus>,
    conn: &mut SqliteConnection,
) -> Result<Vec<SubOrder>, sqlx::Error> {
    let mut builder = QueryBuilder::new(format!("SELECT {SUBORDER_COLUMNS} FROM suborders WHERE hub_id = "));
    builder.push_bind(hub_id);
    if let Some(status) = status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    trace!("📋️ Executing query: {}", builder.sql());
    builder.build_query_as::<SubOrder>().fetch_all(&mut *conn).await
}

pub async fn fetch_order_items(suborder_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT id, suborder_id, product_id, quantity, price_at_purchase, created_at
        FROM order_items WHERE suborder_id = ? ORDER BY id ASC
        "#,
    )
    .bind(suborder_id)
    .fetch_all(&mut *conn)
    .await
}

//--------------------------------------   Guarded updates   ---------------------------------------------------------
// Every status write carries its precondition in the WHERE clause. A return value of false means the precondition no
// longer held at commit time (a concurrent writer got there first), never that the row was silently overwritten.

pub async fn set_correlation_id(
    order_id: i64,
    correlation_id: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE master_orders SET correlation_id = ?, updated_at = ? WHERE id = ?")
        .bind(correlation_id)
        .bind(Utc::now())
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_payment_failed(order_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE master_orders SET payment_status = 'failed', updated_at = ? WHERE id = ? AND payment_status = 'pending'",
    )
    .bind(Utc::now())
    .bind(order_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_order_paid(order_id: i64, receipt: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE master_orders SET payment_status = 'paid', momo_receipt = ?, updated_at = ?
        WHERE id = ? AND payment_status != 'paid' AND is_cancelled = 0
        "#,
    )
    .bind(receipt)
    .bind(Utc::now())
    .bind(order_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_order_paid_in_cash(order_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE master_orders SET payment_status = 'paid', updated_at = ? WHERE id = ? AND payment_status = 'pending'",
    )
    .bind(Utc::now())
    .bind(order_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn update_suborder_status(
    suborder_id: i64,
    from: SubOrderStatus,
    to: SubOrderStatus,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE suborders SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(to)
        .bind(Utc::now())
        .bind(suborder_id)
        .bind(from)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// The hub rejection write: returns the sub-order to the merchant and records why, in one statement.
pub async fn set_rejection(suborder_id: i64, reason: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE suborders SET status = ?, rejection_reason = ?, updated_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(SubOrderStatus::PendingMerchantDelivery)
    .bind(reason)
    .bind(Utc::now())
    .bind(suborder_id)
    .bind(SubOrderStatus::AtHubVerificationPending)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_order_cancelled(
    order_id: i64,
    reason: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE master_orders SET is_cancelled = 1, cancelled_at = ?, cancellation_reason = ?, updated_at = ?
        WHERE id = ? AND is_cancelled = 0
        "#,
    )
    .bind(now)
    .bind(reason)
    .bind(now)
    .bind(order_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_refund_opened(
    order_id: i64,
    amount: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE master_orders SET refund_status = 'pending', refund_amount = ?, updated_at = ? WHERE id = ?")
        .bind(amount)
        .bind(Utc::now())
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Marks the whole order refunded once the last refund has been paid out.
pub async fn mark_order_refunded(
    order_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE master_orders SET payment_status = 'refunded', refund_status = 'completed', refund_processed_at = ?,
            updated_at = ?
        WHERE id = ? AND payment_status = 'paid'
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(order_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn count_incomplete_suborders(
    master_order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM suborders WHERE master_order_id = ? AND status != 'completed'")
        .bind(master_order_id)
        .fetch_one(&mut *conn)
        .await
}

/// Ids of hub-ready sub-orders whose pickup window lapsed before `now`.
pub async fn select_overdue_pickup_ids(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id FROM suborders
        WHERE status = 'at_hub_ready_for_pickup' AND pickup_deadline IS NOT NULL AND pickup_deadline < ?
        ORDER BY id ASC
        "#,
    )
    .bind(now)
    .fetch_all(&mut *conn)
    .await
}
