//! Booking Lifecycle: create, confirm and cancel reservations.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::models::booking::{item_tokens, CreateBookingRequest};
use crate::models::{Booking, BookingItem, BookingStatus, PaymentRequest};
use crate::repositories::BookingRepository;
use crate::services::event::EventLookup;
use crate::services::notification::NotificationService;
use crate::services::token::TokenAllocator;
use crate::utils::clock::Clock;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy)]
pub struct BookingConfig {
    /// Upper bound on a user's non-canceled seats per event.
    pub max_booking_per_user: i64,
}

pub struct BookingService {
    events: Arc<dyn EventLookup>,
    tokens: Arc<dyn TokenAllocator>,
    bookings: Arc<dyn BookingRepository>,
    notifications: Arc<NotificationService>,
    clock: Arc<dyn Clock>,
    config: BookingConfig,
}

impl BookingService {
    pub fn new(
        events: Arc<dyn EventLookup>,
        tokens: Arc<dyn TokenAllocator>,
        bookings: Arc<dyn BookingRepository>,
        notifications: Arc<NotificationService>,
        clock: Arc<dyn Clock>,
        config: BookingConfig,
    ) -> Self {
        Self {
            events,
            tokens,
            bookings,
            notifications,
            clock,
            config,
        }
    }

    /// Reserves up to `quantity` seats. The booking may be granted fewer
    /// seats than requested, never zero.
    #[instrument(skip(self, request), fields(event_id = %request.event_id, quantity = request.quantity))]
    pub async fn create_booking(
        &self,
        user_id: Uuid,
        request: CreateBookingRequest,
    ) -> Result<Booking, AppError> {
        if request.quantity < 1 {
            return Err(AppError::ValidationError(
                "quantity must be at least 1".into(),
            ));
        }

        let event = self.events.get_event_by_id(request.event_id).await?;
        if !event.is_active() {
            return Err(AppError::EventNotActive);
        }

        let held = self
            .bookings
            .count_active_quantity(event.id, user_id)
            .await?;
        if held >= self.config.max_booking_per_user {
            return Err(AppError::QuotaExceeded {
                limit: self.config.max_booking_per_user,
            });
        }

        let claimed = self
            .tokens
            .select_available_tokens(user_id, event.id, i64::from(request.quantity))
            .await?;
        if claimed.is_empty() {
            return Err(AppError::NoAvailability);
        }

        let now = self.clock.now();
        let granted = i32::try_from(claimed.len())
            .map_err(|_| AppError::InternalServerError("granted quantity overflow".into()))?;
        let booking = Booking::pending(event.id, user_id, request.quantity, granted, now);
        let items: Vec<BookingItem> = claimed
            .iter()
            .map(|token| BookingItem::new(booking.id, token.clone(), now))
            .collect();

        if let Err(err) = self.bookings.create_booking(&booking, &items).await {
            if let Err(release_err) = self.tokens.release_tokens(&claimed).await {
                error!(
                    error = %release_err,
                    tokens = claimed.len(),
                    "Failed to release tokens after booking insert failure"
                );
            }
            return Err(err);
        }

        if granted < request.quantity {
            info!(booking_id = %booking.id, granted, "Booking partially granted");
        } else {
            info!(booking_id = %booking.id, granted, "Booking created");
        }
        Ok(booking)
    }

    /// Pending -> Confirmed, tokens to Used and a payment, all or nothing.
    #[instrument(skip(self))]
    pub async fn confirm_booking(
        &self,
        executor_id: Uuid,
        booking_id: Uuid,
    ) -> Result<Booking, AppError> {
        let mut booking = self.get_booking_by_id(booking_id).await?;
        if booking.status != BookingStatus::Pending {
            return Err(AppError::StateViolation(format!(
                "booking is {}, only pending bookings can be confirmed",
                booking.status
            )));
        }
        if !booking.is_owned_by(executor_id) {
            return Err(AppError::Unauthorized(
                "booking belongs to another user".into(),
            ));
        }

        let event = self.events.get_event_by_id(booking.event_id).await?;
        let items = self.bookings.get_booking_items(booking.id).await?;

        let payment = PaymentRequest {
            booking_id: booking.id,
            amount: event.price * Decimal::from(booking.quantity),
            currency: event.currency.clone(),
        };
        let now = self.clock.now();
        let paid = self
            .bookings
            .confirm_booking(&booking, &items, &payment, now)
            .await?;

        booking.status = BookingStatus::Confirmed;
        booking.updated_at = now;
        info!(payment_id = %paid.id, amount = %paid.amount, "Booking confirmed");

        self.notifications.booking_confirmed(&event, &booking);
        Ok(booking)
    }

    /// Cancels the booking and returns the seats it still holds.
    #[instrument(skip(self))]
    pub async fn cancel_booking(
        &self,
        executor_id: Uuid,
        booking_id: Uuid,
    ) -> Result<Booking, AppError> {
        let mut booking = self.get_booking_by_id(booking_id).await?;
        if !booking.is_owned_by(executor_id) {
            return Err(AppError::Unauthorized(
                "booking belongs to another user".into(),
            ));
        }
        if booking.status.is_canceled() {
            return Err(AppError::StateViolation(
                "booking is already canceled".into(),
            ));
        }

        let event = self.events.get_event_by_id(booking.event_id).await?;
        let now = self.clock.now();
        if event.has_started(now) {
            return Err(AppError::EventAlreadyStarted);
        }

        let items = self.bookings.get_booking_items(booking.id).await?;
        if items.is_empty() {
            warn!("Booking has no items, nothing to cancel");
            return Ok(booking);
        }

        let released = self.bookings.cancel_booking(&booking, &items, now).await?;
        if released < items.len() as u64 {
            warn!(
                released,
                items = items.len(),
                tokens = ?item_tokens(&items),
                "Some tokens were no longer held by the booking"
            );
        }

        booking.status = BookingStatus::Canceled;
        booking.updated_at = now;
        info!(released, "Booking canceled");
        Ok(booking)
    }

    pub async fn get_booking_by_id(&self, id: Uuid) -> Result<Booking, AppError> {
        self.bookings
            .get_booking_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("booking '{id}' was not found")))
    }

    pub async fn get_booking_items(&self, id: Uuid) -> Result<Vec<BookingItem>, AppError> {
        self.get_booking_by_id(id).await?;
        self.bookings.get_booking_items(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};

    use crate::models::{Event, EventStatus, NotificationTask, Payment};
    use crate::services::notification::{EnqueueError, TaskQueue};
    use crate::utils::clock::ManualClock;

    struct MockEvents {
        events: Mutex<HashMap<Uuid, Event>>,
    }

    #[async_trait]
    impl EventLookup for MockEvents {
        async fn get_event_by_id(&self, id: Uuid) -> Result<Event, AppError> {
            self.events
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| AppError::NotFound("event".into()))
        }
    }

    #[derive(Default)]
    struct MockAllocator {
        grant: usize,
        released: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TokenAllocator for MockAllocator {
        async fn select_available_tokens(
            &self,
            _holder_id: Uuid,
            _event_id: Uuid,
            quantity: i64,
        ) -> Result<Vec<String>, AppError> {
            let n = self.grant.min(quantity as usize);
            Ok((0..n).map(|i| format!("tok-{i}")).collect())
        }

        async fn release_tokens(&self, tokens: &[String]) -> Result<u64, AppError> {
            self.released.lock().unwrap().extend_from_slice(tokens);
            Ok(tokens.len() as u64)
        }
    }

    #[derive(Default)]
    struct MockBookings {
        bookings: Mutex<HashMap<Uuid, Booking>>,
        items: Mutex<Vec<BookingItem>>,
        held: i64,
        fail_insert: bool,
        payments: Mutex<Vec<PaymentRequest>>,
    }

    #[async_trait]
    impl BookingRepository for MockBookings {
        async fn create_booking(
            &self,
            booking: &Booking,
            items: &[BookingItem],
        ) -> Result<(), AppError> {
            if self.fail_insert {
                return Err(AppError::DatabaseError(sqlx::Error::PoolClosed));
            }
            self.bookings
                .lock()
                .unwrap()
                .insert(booking.id, booking.clone());
            self.items.lock().unwrap().extend_from_slice(items);
            Ok(())
        }

        async fn count_active_quantity(&self, _: Uuid, _: Uuid) -> Result<i64, AppError> {
            Ok(self.held)
        }

        async fn get_booking_by_id(&self, id: Uuid) -> Result<Option<Booking>, AppError> {
            Ok(self.bookings.lock().unwrap().get(&id).cloned())
        }

        async fn get_booking_items(&self, id: Uuid) -> Result<Vec<BookingItem>, AppError> {
            Ok(self
                .items
                .lock()
                .unwrap()
                .iter()
                .filter(|i| i.booking_id == id)
                .cloned()
                .collect())
        }

        async fn confirm_booking(
            &self,
            booking: &Booking,
            _items: &[BookingItem],
            payment: &PaymentRequest,
            now: DateTime<Utc>,
        ) -> Result<Payment, AppError> {
            self.payments.lock().unwrap().push(payment.clone());
            if let Some(b) = self.bookings.lock().unwrap().get_mut(&booking.id) {
                b.status = BookingStatus::Confirmed;
            }
            Ok(Payment {
                id: "pay_test".into(),
                booking_id: booking.id,
                amount: payment.amount,
                currency: payment.currency.clone(),
                status: "succeeded".into(),
                created_at: now,
            })
        }

        async fn cancel_booking(
            &self,
            booking: &Booking,
            items: &[BookingItem],
            _now: DateTime<Utc>,
        ) -> Result<u64, AppError> {
            if let Some(b) = self.bookings.lock().unwrap().get_mut(&booking.id) {
                b.status = BookingStatus::Canceled;
            }
            Ok(items.len() as u64)
        }
    }

    #[derive(Default)]
    struct RecordingQueue {
        tasks: Mutex<Vec<NotificationTask>>,
    }

    impl TaskQueue for RecordingQueue {
        fn enqueue(&self, task: NotificationTask) -> Result<(), EnqueueError> {
            self.tasks.lock().unwrap().push(task);
            Ok(())
        }
    }

    struct Harness {
        service: BookingService,
        bookings: Arc<MockBookings>,
        allocator: Arc<MockAllocator>,
        queue: Arc<RecordingQueue>,
        clock: Arc<ManualClock>,
        event: Event,
    }

    fn harness(allocator: MockAllocator, bookings: MockBookings, status: EventStatus) -> Harness {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let now = clock.now();
        let event = Event {
            id: Uuid::new_v4(),
            name: "Gala".into(),
            available_seats: 4,
            start_at: now + Duration::hours(6),
            location: "Hoi An".into(),
            category: "gala".into(),
            price: Decimal::new(1500, 2),
            currency: "USD".into(),
            status,
            creator_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        let events = Arc::new(MockEvents {
            events: Mutex::new(HashMap::from([(event.id, event.clone())])),
        });
        let allocator = Arc::new(allocator);
        let bookings = Arc::new(bookings);
        let queue = Arc::new(RecordingQueue::default());
        let service = BookingService::new(
            events,
            allocator.clone(),
            bookings.clone(),
            Arc::new(NotificationService::new(queue.clone())),
            clock.clone(),
            BookingConfig {
                max_booking_per_user: 4,
            },
        );
        Harness {
            service,
            bookings,
            allocator,
            queue,
            clock,
            event,
        }
    }

    fn allocator(grant: usize) -> MockAllocator {
        MockAllocator {
            grant,
            ..Default::default()
        }
    }

    fn request(h: &Harness, quantity: i32) -> CreateBookingRequest {
        CreateBookingRequest {
            event_id: h.event.id,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_inactive_event() {
        let h = harness(allocator(2), MockBookings::default(), EventStatus::Inactive);
        let err = h
            .service
            .create_booking(Uuid::new_v4(), request(&h, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EventNotActive));
    }

    #[tokio::test]
    async fn test_create_enforces_quota() {
        let bookings = MockBookings {
            held: 4,
            ..Default::default()
        };
        let h = harness(allocator(2), bookings, EventStatus::Active);
        let err = h
            .service
            .create_booking(Uuid::new_v4(), request(&h, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded { limit: 4 }));
    }

    #[tokio::test]
    async fn test_create_without_tokens_is_no_availability() {
        let h = harness(allocator(0), MockBookings::default(), EventStatus::Active);
        let err = h
            .service
            .create_booking(Uuid::new_v4(), request(&h, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoAvailability));
    }

    #[tokio::test]
    async fn test_create_accepts_partial_grant() {
        let h = harness(allocator(2), MockBookings::default(), EventStatus::Active);
        let booking = h
            .service
            .create_booking(Uuid::new_v4(), request(&h, 3))
            .await
            .unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.initial_quantity, 3);
        assert_eq!(booking.quantity, 2);
        assert_eq!(h.service.get_booking_items(booking.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_insert_releases_claimed_tokens() {
        let bookings = MockBookings {
            fail_insert: true,
            ..Default::default()
        };
        let h = harness(allocator(2), bookings, EventStatus::Active);
        let err = h
            .service
            .create_booking(Uuid::new_v4(), request(&h, 2))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::DatabaseError(_)));
        assert_eq!(*h.allocator.released.lock().unwrap(), vec!["tok-0", "tok-1"]);
    }

    #[tokio::test]
    async fn test_confirm_charges_price_times_quantity_and_notifies() {
        let h = harness(allocator(2), MockBookings::default(), EventStatus::Active);
        let user = Uuid::new_v4();
        let booking = h.service.create_booking(user, request(&h, 2)).await.unwrap();

        let confirmed = h.service.confirm_booking(user, booking.id).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let payments = h.bookings.payments.lock().unwrap();
        assert_eq!(payments[0].amount, Decimal::new(3000, 2));
        assert_eq!(payments[0].currency, "USD");

        let tasks = h.queue.tasks.lock().unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.user_id == user));
    }

    #[tokio::test]
    async fn test_confirm_checks_state_before_ownership() {
        let h = harness(allocator(1), MockBookings::default(), EventStatus::Active);
        let user = Uuid::new_v4();
        let booking = h.service.create_booking(user, request(&h, 1)).await.unwrap();

        let err = h
            .service
            .confirm_booking(Uuid::new_v4(), booking.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        h.service.confirm_booking(user, booking.id).await.unwrap();
        let err = h
            .service
            .confirm_booking(Uuid::new_v4(), booking.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StateViolation(_)));
    }

    #[tokio::test]
    async fn test_confirm_unknown_booking_is_not_found() {
        let h = harness(allocator(1), MockBookings::default(), EventStatus::Active);
        let err = h
            .service
            .confirm_booking(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cancel_after_start_mutates_nothing() {
        let h = harness(allocator(1), MockBookings::default(), EventStatus::Active);
        let user = Uuid::new_v4();
        let booking = h.service.create_booking(user, request(&h, 1)).await.unwrap();

        h.clock.advance(Duration::hours(7));
        let err = h.service.cancel_booking(user, booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::EventAlreadyStarted));

        let stored = h.service.get_booking_by_id(booking.id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_twice_is_state_violation() {
        let h = harness(allocator(1), MockBookings::default(), EventStatus::Active);
        let user = Uuid::new_v4();
        let booking = h.service.create_booking(user, request(&h, 1)).await.unwrap();

        let canceled = h.service.cancel_booking(user, booking.id).await.unwrap();
        assert_eq!(canceled.status, BookingStatus::Canceled);

        let err = h.service.cancel_booking(user, booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::StateViolation(msg) if msg.contains("already canceled")));
    }

    #[tokio::test]
    async fn test_cancel_by_stranger_is_unauthorized() {
        let h = harness(allocator(1), MockBookings::default(), EventStatus::Active);
        let booking = h
            .service
            .create_booking(Uuid::new_v4(), request(&h, 1))
            .await
            .unwrap();

        let err = h
            .service
            .cancel_booking(Uuid::new_v4(), booking.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
