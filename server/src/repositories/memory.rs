//! In-process store with the same contract as the PostgreSQL repositories.
//!
//! One async mutex guards all tables, so every trait method behaves like a
//! serializable transaction. Used by tests and local runs without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::clients::PaymentGateway;
use crate::models::{
    Booking, BookingItem, BookingStatus, Event, EventQuery, EventStatus, EventToken, Payment,
    PaymentRequest, TokenAvailability, TokenStatus,
};
use crate::repositories::{BookingRepository, EventRepository, TokenRepository};
use crate::utils::error::AppError;

#[derive(Default)]
struct Tables {
    events: HashMap<Uuid, Event>,
    /// Insertion order doubles as claim order.
    tokens: Vec<EventToken>,
    bookings: HashMap<Uuid, Booking>,
    items: Vec<BookingItem>,
}

impl Tables {
    fn release_where<F>(&mut self, tokens: &[String], now: DateTime<Utc>, eligible: F) -> u64
    where
        F: Fn(&EventToken) -> bool,
    {
        let mut released = 0;
        for token in self.tokens.iter_mut() {
            if tokens.contains(&token.token) && eligible(token) {
                token.release(now);
                released += 1;
            }
        }
        released
    }

    /// Locked or Used tokens of `event_id` whose holder is `holder_id`.
    fn release_held(
        &mut self,
        event_id: Uuid,
        holder_id: Uuid,
        tokens: &[String],
        now: DateTime<Utc>,
    ) -> u64 {
        self.release_where(tokens, now, |t| {
            t.status != TokenStatus::Active && t.event_id == event_id && t.is_held_by(holder_id)
        })
    }
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
    payments: Arc<dyn PaymentGateway>,
    fail_booking_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new(payments: Arc<dyn PaymentGateway>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            payments,
            fail_booking_writes: AtomicBool::new(false),
        }
    }

    /// Test hook: makes `create_booking` fail with a store error until
    /// switched off.
    pub fn set_booking_write_failure(&self, fail: bool) {
        self.fail_booking_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TokenRepository for MemoryStore {
    async fn get_by_token(&self, token: &str) -> Result<Option<EventToken>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.tokens.iter().find(|t| t.token == token).cloned())
    }

    async fn list_by_event(&self, event_id: Uuid) -> Result<Vec<EventToken>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .tokens
            .iter()
            .filter(|t| t.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn count_by_status(
        &self,
        event_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TokenAvailability, AppError> {
        let tables = self.tables.lock().await;
        let mut counts = TokenAvailability::default();
        for token in tables.tokens.iter().filter(|t| t.event_id == event_id) {
            match token.status {
                TokenStatus::Active => counts.active += 1,
                TokenStatus::Used => counts.used += 1,
                TokenStatus::Locked => {
                    counts.locked += 1;
                    if token.is_claimable(now) {
                        counts.expired_locks += 1;
                    }
                }
            }
        }
        Ok(counts)
    }

    async fn select_available_tokens(
        &self,
        holder_id: Uuid,
        event_id: Uuid,
        quantity: i64,
        locked_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, AppError> {
        let limit = usize::try_from(quantity).unwrap_or(0);
        let mut tables = self.tables.lock().await;

        let claimed = tables
            .tokens
            .iter_mut()
            .filter(|t| t.event_id == event_id && t.is_claimable(now))
            .take(limit)
            .map(|token| {
                token.lock(holder_id, locked_until, now);
                token.token.clone()
            })
            .collect();

        Ok(claimed)
    }

    async fn release_tokens(
        &self,
        tokens: &[String],
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.release_where(tokens, now, |t| t.status == TokenStatus::Locked))
    }

    async fn release_held_tokens(
        &self,
        event_id: Uuid,
        holder_id: Uuid,
        tokens: &[String],
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.release_held(event_id, holder_id, tokens, now))
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn create_event(&self, event: &Event, tokens: &[EventToken]) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        tables.events.insert(event.id, event.clone());
        tables.tokens.extend(tokens.iter().map(|t| EventToken {
            event_id: event.id,
            ..t.clone()
        }));
        Ok(())
    }

    async fn get_event_by_id(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.events.get(&id).cloned())
    }

    async fn query_events(&self, query: &EventQuery) -> Result<Vec<Event>, AppError> {
        let tables = self.tables.lock().await;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let offset = usize::try_from(query.pagination.offset()).unwrap_or(0);
        let limit = usize::try_from(query.pagination.limit()).unwrap_or(0);
        Ok(events.into_iter().skip(offset).take(limit).collect())
    }

    async fn update_event_status(
        &self,
        id: Uuid,
        status: EventStatus,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        let event = tables
            .events
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("event '{id}' was not found")))?;
        event.status = status;
        event.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
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
        if self.fail_booking_writes.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }

        let mut tables = self.tables.lock().await;
        tables.bookings.insert(booking.id, booking.clone());
        tables.items.extend_from_slice(items);
        Ok(())
    }

    async fn count_active_quantity(&self, event_id: Uuid, user_id: Uuid) -> Result<i64, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bookings
            .values()
            .filter(|b| b.event_id == event_id && b.user_id == user_id && !b.status.is_canceled())
            .map(|b| i64::from(b.quantity))
            .sum())
    }

    async fn get_booking_by_id(&self, id: Uuid) -> Result<Option<Booking>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.bookings.get(&id).cloned())
    }

    async fn get_booking_items(&self, booking_id: Uuid) -> Result<Vec<BookingItem>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .items
            .iter()
            .filter(|i| i.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn confirm_booking(
        &self,
        booking: &Booking,
        items: &[BookingItem],
        payment: &PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<Payment, AppError> {
        // Held for the whole operation, payment call included.
        let mut tables = self.tables.lock().await;

        let current = tables
            .bookings
            .get(&booking.id)
            .ok_or_else(|| AppError::NotFound(format!("booking '{}' was not found", booking.id)))?;
        if current.status != BookingStatus::Pending {
            return Err(AppError::StateViolation("booking is not pending".into()));
        }

        let held: Vec<usize> = tables
            .tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| {
                t.status == TokenStatus::Locked
                    && t.event_id == booking.event_id
                    && t.is_held_by(booking.user_id)
                    && items.iter().any(|i| i.token == t.token)
            })
            .map(|(idx, _)| idx)
            .collect();
        if held.len() != items.len() {
            return Err(AppError::StateViolation(format!(
                "reservation expired: {} of {} seats are still held",
                held.len(),
                items.len()
            )));
        }

        let created = self.payments.create_payment(payment).await?;

        for idx in held {
            tables.tokens[idx].mark_used(now);
        }
        if let Some(stored) = tables.bookings.get_mut(&booking.id) {
            stored.status = BookingStatus::Confirmed;
            stored.updated_at = now;
        }
        Ok(created)
    }

    async fn cancel_booking(
        &self,
        booking: &Booking,
        items: &[BookingItem],
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut tables = self.tables.lock().await;

        let stored = tables
            .bookings
            .get_mut(&booking.id)
            .ok_or_else(|| AppError::NotFound(format!("booking '{}' was not found", booking.id)))?;
        if stored.status.is_canceled() {
            return Err(AppError::StateViolation("booking is already canceled".into()));
        }
        stored.status = BookingStatus::Canceled;
        stored.updated_at = now;

        let tokens: Vec<String> = items.iter().map(|i| i.token.clone()).collect();
        Ok(tables.release_held(booking.event_id, booking.user_id, &tokens, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::NoopPaymentGateway;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn store() -> MemoryStore {
        MemoryStore::new(Arc::new(NoopPaymentGateway))
    }

    async fn seed_event(store: &MemoryStore, seats: usize, now: DateTime<Utc>) -> Uuid {
        let event = Event {
            id: Uuid::new_v4(),
            name: "Quartet".into(),
            available_seats: seats as i32,
            start_at: now + Duration::days(7),
            location: "Da Nang".into(),
            category: "music".into(),
            price: Decimal::new(1000, 2),
            currency: "USD".into(),
            status: EventStatus::Active,
            creator_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        let tokens: Vec<EventToken> = (0..seats).map(|_| EventToken::new(event.id, now)).collect();
        store.create_event(&event, &tokens).await.unwrap();
        event.id
    }

    #[tokio::test]
    async fn test_claims_never_overlap() {
        let store = store();
        let now = Utc::now();
        let event_id = seed_event(&store, 3, now).await;
        let until = now + Duration::minutes(10);

        let first = store
            .select_available_tokens(Uuid::new_v4(), event_id, 2, until, now)
            .await
            .unwrap();
        let second = store
            .select_available_tokens(Uuid::new_v4(), event_id, 2, until, now)
            .await
            .unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1, "only one seat was left");
        assert!(second.iter().all(|t| !first.contains(t)));
    }

    #[tokio::test]
    async fn test_expired_lock_is_reclaimed() {
        let store = store();
        let now = Utc::now();
        let event_id = seed_event(&store, 1, now).await;
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let claimed = store
            .select_available_tokens(alice, event_id, 1, now + Duration::minutes(1), now)
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);

        let later = now + Duration::minutes(2);
        let reclaimed = store
            .select_available_tokens(bob, event_id, 1, later + Duration::minutes(1), later)
            .await
            .unwrap();
        assert_eq!(reclaimed, claimed);

        let token = store.get_by_token(&claimed[0]).await.unwrap().unwrap();
        assert!(token.is_held_by(bob));
    }

    #[tokio::test]
    async fn test_release_is_idempotent_and_skips_used() {
        let store = store();
        let now = Utc::now();
        let event_id = seed_event(&store, 1, now).await;
        let holder = Uuid::new_v4();
        let tokens = store
            .select_available_tokens(holder, event_id, 1, now + Duration::minutes(5), now)
            .await
            .unwrap();

        assert_eq!(store.release_tokens(&tokens, now).await.unwrap(), 1);
        assert_eq!(store.release_tokens(&tokens, now).await.unwrap(), 0);

        let counts = store.count_by_status(event_id, now).await.unwrap();
        assert_eq!(counts.active, 1);
        assert_eq!(counts.locked, 0);
    }

    #[tokio::test]
    async fn test_release_held_ignores_other_holders() {
        let store = store();
        let now = Utc::now();
        let event_id = seed_event(&store, 1, now).await;
        let tokens = store
            .select_available_tokens(Uuid::new_v4(), event_id, 1, now + Duration::minutes(5), now)
            .await
            .unwrap();

        let released = store
            .release_held_tokens(event_id, Uuid::new_v4(), &tokens, now)
            .await
            .unwrap();
        assert_eq!(released, 0);
    }

    #[tokio::test]
    async fn test_cancel_returns_used_seats_to_pool() {
        let store = store();
        let now = Utc::now();
        let event_id = seed_event(&store, 1, now).await;
        let user = Uuid::new_v4();
        let tokens = store
            .select_available_tokens(user, event_id, 1, now + Duration::minutes(5), now)
            .await
            .unwrap();
        let booking = Booking::pending(event_id, user, 1, 1, now);
        let items: Vec<BookingItem> = tokens
            .iter()
            .map(|t| BookingItem::new(booking.id, t.clone(), now))
            .collect();
        store.create_booking(&booking, &items).await.unwrap();

        let payment = PaymentRequest {
            booking_id: booking.id,
            amount: Decimal::new(1000, 2),
            currency: "USD".into(),
        };
        store
            .confirm_booking(&booking, &items, &payment, now)
            .await
            .unwrap();
        assert_eq!(store.release_tokens(&tokens, now).await.unwrap(), 0);

        let released = store.cancel_booking(&booking, &items, now).await.unwrap();
        assert_eq!(released, 1);

        let counts = store.count_by_status(event_id, now).await.unwrap();
        assert_eq!(counts.active, 1);
        assert_eq!(counts.used, 0);
    }

    #[tokio::test]
    async fn test_query_events_orders_by_recent_update() {
        let store = store();
        let now = Utc::now();
        let older = seed_event(&store, 1, now).await;
        let newer = seed_event(&store, 1, now).await;
        store
            .update_event_status(newer, EventStatus::Inactive, now + Duration::seconds(1))
            .await
            .unwrap();

        let events = store.query_events(&EventQuery::default()).await.unwrap();
        let ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![newer, older]);
    }
}
