use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::error::AppError;

/// Reservation lifecycle. `Canceled` is absorbing; `Paid` is not reached yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Paid,
    Canceled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Paid => "paid",
            BookingStatus::Canceled => "canceled",
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, BookingStatus::Canceled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "paid" => Ok(BookingStatus::Paid),
            "canceled" => Ok(BookingStatus::Canceled),
            other => Err(AppError::InternalServerError(format!(
                "unknown booking status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub status: BookingStatus,
    pub initial_quantity: i32,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn pending(
        event_id: Uuid,
        user_id: Uuid,
        requested: i32,
        granted: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            user_id,
            status: BookingStatus::Pending,
            initial_quantity: requested,
            quantity: granted,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BookingItem {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl BookingItem {
    pub fn new(booking_id: Uuid, token: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            token,
            created_at: now,
        }
    }
}

pub fn item_tokens(items: &[BookingItem]) -> Vec<String> {
    items.iter().map(|item| item.token.clone()).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub event_id: Uuid,
    pub quantity: i32,
}
