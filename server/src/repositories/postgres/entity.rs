//! Row shapes as stored, and their conversion into domain models. Status
//! columns are TEXT and are parsed here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{Booking, Event, EventToken};
use crate::utils::error::AppError;

pub(crate) const EVENT_COLUMNS: &str = "id, name, available_seats, start_at, location, category, \
     price, currency, status, creator_id, created_at, updated_at";

pub(crate) const TOKEN_COLUMNS: &str =
    "id, event_id, token, status, holder_id, locked_until, created_at, updated_at";

pub(crate) const BOOKING_COLUMNS: &str =
    "id, event_id, user_id, status, initial_quantity, quantity, created_at, updated_at";

#[derive(Debug, FromRow)]
pub(crate) struct EventRow {
    pub id: Uuid,
    pub name: String,
    pub available_seats: i32,
    pub start_at: DateTime<Utc>,
    pub location: String,
    pub category: String,
    pub price: Decimal,
    pub currency: String,
    pub status: String,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = AppError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Event {
            id: row.id,
            name: row.name,
            available_seats: row.available_seats,
            start_at: row.start_at,
            location: row.location,
            category: row.category,
            price: row.price,
            currency: row.currency,
            status: row.status.parse()?,
            creator_id: row.creator_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct TokenRow {
    pub id: Uuid,
    pub event_id: Uuid,
    pub token: String,
    pub status: String,
    pub holder_id: Option<Uuid>,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TokenRow> for EventToken {
    type Error = AppError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        Ok(EventToken {
            id: row.id,
            event_id: row.event_id,
            token: row.token,
            status: row.status.parse()?,
            holder_id: row.holder_id,
            locked_until: row.locked_until,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct BookingRow {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub initial_quantity: i32,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = AppError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            event_id: row.event_id,
            user_id: row.user_id,
            status: row.status.parse()?,
            initial_quantity: row.initial_quantity,
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn convert_all<R, M>(rows: Vec<R>) -> Result<Vec<M>, AppError>
where
    M: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(M::try_from).collect()
}
