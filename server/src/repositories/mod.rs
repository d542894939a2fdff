//! Storage seams for the inventory and booking state.
//!
//! Every method that mutates more than one row runs in exactly one store
//! transaction. Implementations never hold locks across calls.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Booking, BookingItem, Event, EventQuery, EventStatus, EventToken, Payment, PaymentRequest,
    TokenAvailability,
};
use crate::utils::error::AppError;

pub use memory::MemoryStore;
pub use postgres::{PgBookingRepository, PgEventRepository, PgTokenRepository};

/// Inventory Store: owns every `event_tokens` row.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn get_by_token(&self, token: &str) -> Result<Option<EventToken>, AppError>;

    async fn list_by_event(&self, event_id: Uuid) -> Result<Vec<EventToken>, AppError>;

    async fn count_by_status(
        &self,
        event_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TokenAvailability, AppError>;

    /// Claims up to `quantity` claimable tokens of `event_id` for `holder_id`
    /// without waiting on rows another transaction holds. Returns the claimed
    /// token strings; fewer than `quantity` is not an error.
    async fn select_available_tokens(
        &self,
        holder_id: Uuid,
        event_id: Uuid,
        quantity: i64,
        locked_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, AppError>;

    /// Locked -> Active with no ownership check. Active tokens are left as
    /// they are; Used tokens are never released. Returns rows moved.
    async fn release_tokens(&self, tokens: &[String], now: DateTime<Utc>)
        -> Result<u64, AppError>;

    /// Locked or Used -> Active, restricted to tokens of `event_id` still held
    /// by `holder_id`. A lapsed lock reclaimed by someone else is untouched.
    async fn release_held_tokens(
        &self,
        event_id: Uuid,
        holder_id: Uuid,
        tokens: &[String],
        now: DateTime<Utc>,
    ) -> Result<u64, AppError>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Inserts the event and its whole token pool atomically.
    async fn create_event(&self, event: &Event, tokens: &[EventToken]) -> Result<(), AppError>;

    async fn get_event_by_id(&self, id: Uuid) -> Result<Option<Event>, AppError>;

    async fn query_events(&self, query: &EventQuery) -> Result<Vec<Event>, AppError>;

    async fn update_event_status(
        &self,
        id: Uuid,
        status: EventStatus,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;
}

/// Booking store: owns `bookings` and `booking_items`, and drives token
/// confirmation and release inside its own transactions.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create_booking(&self, booking: &Booking, items: &[BookingItem])
        -> Result<(), AppError>;

    /// Sum of granted quantities over the user's non-canceled bookings for the event.
    async fn count_active_quantity(&self, event_id: Uuid, user_id: Uuid) -> Result<i64, AppError>;

    async fn get_booking_by_id(&self, id: Uuid) -> Result<Option<Booking>, AppError>;

    async fn get_booking_items(&self, booking_id: Uuid) -> Result<Vec<BookingItem>, AppError>;

    /// Pending -> Confirmed, the booking's tokens Locked -> Used, and a
    /// payment, all or nothing. A payment failure rolls everything back.
    async fn confirm_booking(
        &self,
        booking: &Booking,
        items: &[BookingItem],
        payment: &PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<Payment, AppError>;

    /// Marks the booking Canceled and returns the tokens its user still holds,
    /// Locked or Used, to Active. Returns the number of tokens released.
    async fn cancel_booking(
        &self,
        booking: &Booking,
        items: &[BookingItem],
        now: DateTime<Utc>,
    ) -> Result<u64, AppError>;
}
