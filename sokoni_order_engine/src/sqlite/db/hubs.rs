use sqlx::SqliteConnection;

use crate::{db_types::Hub, traits::NewHub};

pub async fn insert_hub(new: &NewHub, conn: &mut SqliteConnection) -> Result<Hub, sqlx::Error> {
    let result = sqlx::query("INSERT INTO hubs (name, city, is_active) VALUES (?, ?, 1)")
        .bind(&new.name)
        .bind(&new.city)
        .execute(&mut *conn)
        .await?;
    fetch_hub(result.last_insert_rowid(), conn).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn fetch_hub(hub_id: i64, conn: &mut SqliteConnection) -> Result<Option<Hub>, sqlx::Error> {
    sqlx::query_as::<_, Hub>("SELECT id, name, city, is_active FROM hubs WHERE id = ?")
        .bind(hub_id)
        .fetch_optional(&mut *conn)
        .await
}
