//! Token Allocator: contention-safe claim and release of seat tokens.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::models::{EventToken, TokenAvailability};
use crate::repositories::TokenRepository;
use crate::utils::clock::Clock;
use crate::utils::error::AppError;

/// The slice of the allocator the booking lifecycle depends on.
#[async_trait]
pub trait TokenAllocator: Send + Sync {
    async fn select_available_tokens(
        &self,
        holder_id: Uuid,
        event_id: Uuid,
        quantity: i64,
    ) -> Result<Vec<String>, AppError>;

    async fn release_tokens(&self, tokens: &[String]) -> Result<u64, AppError>;
}

pub struct TokenService {
    tokens: Arc<dyn TokenRepository>,
    clock: Arc<dyn Clock>,
    lock_duration: Duration,
}

impl TokenService {
    pub fn new(
        tokens: Arc<dyn TokenRepository>,
        clock: Arc<dyn Clock>,
        lock_duration: Duration,
    ) -> Self {
        Self {
            tokens,
            clock,
            lock_duration,
        }
    }

    /// Claims up to `quantity` tokens, locking them until `now + lock_duration`.
    /// A shorter result than requested is not an error.
    #[instrument(skip(self))]
    pub async fn claim(
        &self,
        holder_id: Uuid,
        event_id: Uuid,
        quantity: i64,
        lock_duration: Duration,
    ) -> Result<Vec<String>, AppError> {
        if quantity < 1 {
            return Err(AppError::ValidationError(
                "quantity must be at least 1".into(),
            ));
        }
        if lock_duration <= Duration::zero() {
            return Err(AppError::ValidationError(
                "lock duration must be positive".into(),
            ));
        }

        let now = self.clock.now();
        let claimed = self
            .tokens
            .select_available_tokens(holder_id, event_id, quantity, now + lock_duration, now)
            .await?;

        debug!(requested = quantity, granted = claimed.len(), "Claimed tokens");
        Ok(claimed)
    }

    /// Releases a single token. Unknown tokens are `NotFound`; an already
    /// active token is left alone.
    #[instrument(skip(self))]
    pub async fn release_token(&self, token: &str) -> Result<(), AppError> {
        if self.tokens.get_by_token(token).await?.is_none() {
            return Err(AppError::NotFound(format!("token '{token}' was not found")));
        }
        self.tokens
            .release_tokens(&[token.to_string()], self.clock.now())
            .await?;
        Ok(())
    }

    pub async fn get_by_token(&self, token: &str) -> Result<EventToken, AppError> {
        self.tokens
            .get_by_token(token)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("token '{token}' was not found")))
    }

    pub async fn list_event_tokens(&self, event_id: Uuid) -> Result<Vec<EventToken>, AppError> {
        self.tokens.list_by_event(event_id).await
    }

    pub async fn count_tokens_by_status(
        &self,
        event_id: Uuid,
    ) -> Result<TokenAvailability, AppError> {
        self.tokens.count_by_status(event_id, self.clock.now()).await
    }
}

#[async_trait]
impl TokenAllocator for TokenService {
    async fn select_available_tokens(
        &self,
        holder_id: Uuid,
        event_id: Uuid,
        quantity: i64,
    ) -> Result<Vec<String>, AppError> {
        self.claim(holder_id, event_id, quantity, self.lock_duration)
            .await
    }

    #[instrument(skip(self, tokens), fields(count = tokens.len()))]
    async fn release_tokens(&self, tokens: &[String]) -> Result<u64, AppError> {
        self.tokens.release_tokens(tokens, self.clock.now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::NoopPaymentGateway;
    use crate::models::{Event, EventStatus, TokenStatus};
    use crate::repositories::{EventRepository, MemoryStore};
    use crate::utils::clock::ManualClock;
    use chrono::Utc;
    use rust_decimal::Decimal;

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        service: TokenService,
        event_id: Uuid,
    }

    async fn fixture(seats: usize) -> Fixture {
        let store = Arc::new(MemoryStore::new(Arc::new(NoopPaymentGateway)));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let now = clock.now();
        let event = Event {
            id: Uuid::new_v4(),
            name: "Matinee".into(),
            available_seats: seats as i32,
            start_at: now + Duration::days(1),
            location: "Hue".into(),
            category: "theatre".into(),
            price: Decimal::ZERO,
            currency: "USD".into(),
            status: EventStatus::Active,
            creator_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        let tokens: Vec<EventToken> = (0..seats).map(|_| EventToken::new(event.id, now)).collect();
        store.create_event(&event, &tokens).await.unwrap();

        let service = TokenService::new(store.clone(), clock.clone(), Duration::minutes(15));
        Fixture {
            store,
            clock,
            service,
            event_id: event.id,
        }
    }

    #[tokio::test]
    async fn test_rejects_non_positive_quantity() {
        let f = fixture(1).await;
        let err = f
            .service
            .select_available_tokens(Uuid::new_v4(), f.event_id, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_partial_grant_is_not_an_error() {
        let f = fixture(2).await;
        let claimed = f
            .service
            .select_available_tokens(Uuid::new_v4(), f.event_id, 5)
            .await
            .unwrap();
        assert_eq!(claimed.len(), 2);
    }

    #[tokio::test]
    async fn test_lock_expiry_uses_configured_duration() {
        let f = fixture(1).await;
        let holder = Uuid::new_v4();
        let claimed = f
            .service
            .select_available_tokens(holder, f.event_id, 1)
            .await
            .unwrap();

        let token = f.service.get_by_token(&claimed[0]).await.unwrap();
        assert_eq!(token.status, TokenStatus::Locked);
        assert_eq!(token.locked_until, Some(f.clock.now() + Duration::minutes(15)));
        assert!(token.is_held_by(holder));
    }

    #[tokio::test]
    async fn test_abandoned_claim_heals_after_expiry() {
        let f = fixture(1).await;
        f.service
            .select_available_tokens(Uuid::new_v4(), f.event_id, 1)
            .await
            .unwrap();
        let blocked = f
            .service
            .select_available_tokens(Uuid::new_v4(), f.event_id, 1)
            .await
            .unwrap();
        assert!(blocked.is_empty());

        f.clock.advance(Duration::minutes(16));
        let counts = f.service.count_tokens_by_status(f.event_id).await.unwrap();
        assert_eq!(counts.expired_locks, 1);

        let healed = f
            .service
            .select_available_tokens(Uuid::new_v4(), f.event_id, 1)
            .await
            .unwrap();
        assert_eq!(healed.len(), 1);
    }

    #[tokio::test]
    async fn test_list_event_tokens_reflects_claims() {
        let f = fixture(3).await;
        let holder = Uuid::new_v4();
        let claimed = f
            .service
            .select_available_tokens(holder, f.event_id, 1)
            .await
            .unwrap();

        let tokens = f.service.list_event_tokens(f.event_id).await.unwrap();
        assert_eq!(tokens.len(), 3);
        let locked: Vec<&EventToken> = tokens
            .iter()
            .filter(|t| t.status == TokenStatus::Locked)
            .collect();
        assert_eq!(locked.len(), 1);
        assert_eq!(locked[0].token, claimed[0]);
        assert!(locked[0].is_held_by(holder));

        assert!(f
            .service
            .list_event_tokens(Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_release_token_unknown_is_not_found() {
        let f = fixture(1).await;
        let err = f.service.release_token("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_release_token_returns_seat() {
        let f = fixture(1).await;
        let claimed = f
            .service
            .select_available_tokens(Uuid::new_v4(), f.event_id, 1)
            .await
            .unwrap();

        f.service.release_token(&claimed[0]).await.unwrap();
        f.service.release_token(&claimed[0]).await.unwrap();

        let tokens = f.store.list_by_event(f.event_id).await.unwrap();
        assert!(tokens.iter().all(|t| t.status == TokenStatus::Active));
    }
}
