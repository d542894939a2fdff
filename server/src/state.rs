use std::sync::Arc;

use sqlx::PgPool;

use crate::clients::PaymentGateway;
use crate::config::Config;
use crate::repositories::{
    BookingRepository, EventRepository, MemoryStore, PgBookingRepository, PgEventRepository,
    PgTokenRepository, TokenRepository,
};
use crate::services::{
    BookingConfig, BookingService, EventService, NotificationService, TaskQueue, TokenService,
};
use crate::utils::clock::Clock;

/// Shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub events: Arc<EventService>,
    pub bookings: Arc<BookingService>,
}

impl AppState {
    pub fn new(
        token_repo: Arc<dyn TokenRepository>,
        event_repo: Arc<dyn EventRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        queue: Arc<dyn TaskQueue>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(
            token_repo.clone(),
            clock.clone(),
            config.lock_duration(),
        ));
        let events = Arc::new(EventService::new(
            event_repo,
            token_repo,
            clock.clone(),
            config.currency.clone(),
        ));
        let bookings = Arc::new(BookingService::new(
            events.clone(),
            tokens.clone(),
            booking_repo,
            Arc::new(NotificationService::new(queue)),
            clock,
            BookingConfig {
                max_booking_per_user: config.booking.max_booking_per_user,
            },
        ));

        Self {
            tokens,
            events,
            bookings,
        }
    }

    pub fn postgres(
        pool: PgPool,
        payments: Arc<dyn PaymentGateway>,
        queue: Arc<dyn TaskQueue>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self::new(
            Arc::new(PgTokenRepository::new(pool.clone())),
            Arc::new(PgEventRepository::new(pool.clone())),
            Arc::new(PgBookingRepository::new(pool, payments)),
            queue,
            clock,
            config,
        )
    }

    pub fn in_memory(
        store: Arc<MemoryStore>,
        queue: Arc<dyn TaskQueue>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self::new(store.clone(), store.clone(), store, queue, clock, config)
    }
}
