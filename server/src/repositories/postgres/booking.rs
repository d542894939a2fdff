use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use super::entity::{BookingRow, BOOKING_COLUMNS};
use super::item;
use super::token::PgTokenRepository;
use crate::clients::PaymentGateway;
use crate::models::booking::item_tokens;
use crate::models::{Booking, BookingItem, BookingStatus, Payment, PaymentRequest};
use crate::repositories::BookingRepository;
use crate::utils::error::AppError;

#[derive(Clone)]
pub struct PgBookingRepository {
    pool: PgPool,
    payments: Arc<dyn PaymentGateway>,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool, payments: Arc<dyn PaymentGateway>) -> Self {
        Self { pool, payments }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create_booking(
        &self,
        booking: &Booking,
        items: &[BookingItem],
    ) -> Result<(), AppError> {
        if items.is_empty() {
            return Err(AppError::ValidationError(
                "booking items are required".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO bookings (id, event_id, user_id, status, initial_quantity, quantity,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(booking.id)
        .bind(booking.event_id)
        .bind(booking.user_id)
        .bind(booking.status.as_str())
        .bind(booking.initial_quantity)
        .bind(booking.quantity)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await?;

        item::insert_items_tx(&mut *tx, items).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn count_active_quantity(&self, event_id: Uuid, user_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(quantity), 0)::BIGINT
            FROM bookings
            WHERE event_id = $1 AND user_id = $2 AND status <> 'canceled'
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn get_booking_by_id(&self, id: Uuid) -> Result<Option<Booking>, AppError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Booking::try_from).transpose()
    }

    async fn get_booking_items(&self, booking_id: Uuid) -> Result<Vec<BookingItem>, AppError> {
        item::list_by_booking(&self.pool, booking_id).await
    }

    async fn confirm_booking(
        &self,
        booking: &Booking,
        items: &[BookingItem],
        payment: &PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<Payment, AppError> {
        let mut tx = self.pool.begin().await?;

        // The status guard serializes racing confirm/cancel calls on one booking.
        let updated = sqlx::query(
            "UPDATE bookings SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
        )
        .bind(BookingStatus::Confirmed.as_str())
        .bind(now)
        .bind(booking.id)
        .bind(BookingStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::StateViolation("booking is not pending".into()));
        }

        let tokens = item_tokens(items);
        let confirmed = PgTokenRepository::confirm_used_tokens_tx(
            &mut *tx,
            booking.event_id,
            booking.user_id,
            &tokens,
            now,
        )
        .await?;

        if confirmed != tokens.len() as u64 {
            tx.rollback().await?;
            return Err(AppError::StateViolation(format!(
                "reservation expired: {confirmed} of {} seats are still held",
                tokens.len()
            )));
        }

        let created = match self.payments.create_payment(payment).await {
            Ok(created) => created,
            Err(e) => {
                warn!(booking_id = %booking.id, error = %e, "Payment failed, rolling back confirmation");
                tx.rollback().await?;
                return Err(e.into());
            }
        };

        tx.commit().await?;
        Ok(created)
    }

    async fn cancel_booking(
        &self,
        booking: &Booking,
        items: &[BookingItem],
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE bookings SET status = $1, updated_at = $2 WHERE id = $3 AND status <> $1",
        )
        .bind(BookingStatus::Canceled.as_str())
        .bind(now)
        .bind(booking.id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::StateViolation("booking is already canceled".into()));
        }

        let released = PgTokenRepository::release_held_tokens_tx(
            &mut *tx,
            booking.event_id,
            booking.user_id,
            &item_tokens(items),
            now,
        )
        .await?;

        tx.commit().await?;
        Ok(released)
    }
}
