use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::BookingItem;
use crate::utils::error::AppError;

pub(crate) async fn insert_items_tx(
    conn: &mut PgConnection,
    items: &[BookingItem],
) -> Result<(), AppError> {
    let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
    let booking_ids: Vec<Uuid> = items.iter().map(|i| i.booking_id).collect();
    let tokens: Vec<String> = items.iter().map(|i| i.token.clone()).collect();
    let created: Vec<DateTime<Utc>> = items.iter().map(|i| i.created_at).collect();

    sqlx::query(
        r#"
        INSERT INTO booking_items (id, booking_id, token, created_at)
        SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::text[], $4::timestamptz[])
        "#,
    )
    .bind(ids)
    .bind(booking_ids)
    .bind(tokens)
    .bind(created)
    .execute(conn)
    .await?;

    Ok(())
}

pub(crate) async fn list_by_booking(
    pool: &PgPool,
    booking_id: Uuid,
) -> Result<Vec<BookingItem>, AppError> {
    let items = sqlx::query_as::<_, BookingItem>(
        "SELECT id, booking_id, token, created_at FROM booking_items WHERE booking_id = $1 ORDER BY created_at, id",
    )
    .bind(booking_id)
    .fetch_all(pool)
    .await?;

    Ok(items)
}
