//! Event Inventory Manager.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::event::{CreateEventRequest, UpdateEventRequest};
use crate::models::{Event, EventQuery, EventStatus, EventToken, TokenAvailability};
use crate::repositories::{EventRepository, TokenRepository};
use crate::utils::clock::Clock;
use crate::utils::error::AppError;

/// Read access to events, as needed by the booking lifecycle.
#[async_trait]
pub trait EventLookup: Send + Sync {
    async fn get_event_by_id(&self, id: Uuid) -> Result<Event, AppError>;
}

pub struct EventService {
    events: Arc<dyn EventRepository>,
    tokens: Arc<dyn TokenRepository>,
    clock: Arc<dyn Clock>,
    currency: String,
}

impl EventService {
    pub fn new(
        events: Arc<dyn EventRepository>,
        tokens: Arc<dyn TokenRepository>,
        clock: Arc<dyn Clock>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            events,
            tokens,
            clock,
            currency: currency.into(),
        }
    }

    /// Creates an inactive event together with one token per seat.
    #[instrument(skip(self, request), fields(name = %request.name, seats = request.available_seats))]
    pub async fn create_event(
        &self,
        executor_id: Uuid,
        request: CreateEventRequest,
    ) -> Result<Event, AppError> {
        request.validate()?;

        let now = self.clock.now();
        let event = Event {
            id: Uuid::new_v4(),
            name: request.name,
            available_seats: request.available_seats,
            start_at: request.start_at,
            location: request.location,
            category: request.category,
            price: request.price,
            currency: self.currency.clone(),
            status: EventStatus::Inactive,
            creator_id: executor_id,
            created_at: now,
            updated_at: now,
        };
        let tokens: Vec<EventToken> = (0..event.available_seats)
            .map(|_| EventToken::new(event.id, now))
            .collect();

        self.events.create_event(&event, &tokens).await?;

        info!(event_id = %event.id, "Event created");
        Ok(event)
    }

    pub async fn retrieve_event_detail(&self, id: Uuid) -> Result<Event, AppError> {
        self.events
            .get_event_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event '{id}' was not found")))
    }

    pub async fn query_events(&self, query: &EventQuery) -> Result<Vec<Event>, AppError> {
        query.validate()?;
        self.events.query_events(query).await
    }

    /// Only the event's creator may change its status.
    #[instrument(skip(self))]
    pub async fn update_event_status(
        &self,
        executor_id: Uuid,
        event_id: Uuid,
        request: UpdateEventRequest,
    ) -> Result<Event, AppError> {
        let mut event = self.retrieve_event_detail(event_id).await?;
        if event.creator_id != executor_id {
            return Err(AppError::Unauthorized(
                "only the event creator may change its status".into(),
            ));
        }

        let now = self.clock.now();
        self.events
            .update_event_status(event_id, request.status, now)
            .await?;

        info!(status = %request.status, "Event status updated");
        event.status = request.status;
        event.updated_at = now;
        Ok(event)
    }

    pub async fn get_availability(&self, event_id: Uuid) -> Result<TokenAvailability, AppError> {
        self.retrieve_event_detail(event_id).await?;
        self.tokens.count_by_status(event_id, self.clock.now()).await
    }
}

#[async_trait]
impl EventLookup for EventService {
    async fn get_event_by_id(&self, id: Uuid) -> Result<Event, AppError> {
        self.retrieve_event_detail(id).await
    }
}
