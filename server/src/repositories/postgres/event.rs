use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::entity::{convert_all, EventRow, EVENT_COLUMNS};
use super::token::PgTokenRepository;
use crate::models::{Event, EventQuery, EventStatus, EventToken};
use crate::repositories::EventRepository;
use crate::utils::error::AppError;

/// ILIKE pattern matching `needle` literally anywhere in the column.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn create_event(&self, event: &Event, tokens: &[EventToken]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO events (id, name, available_seats, start_at, location, category,
                                price, currency, status, creator_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(event.available_seats)
        .bind(event.start_at)
        .bind(&event.location)
        .bind(&event.category)
        .bind(event.price)
        .bind(&event.currency)
        .bind(event.status.as_str())
        .bind(event.creator_id)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&mut *tx)
        .await?;

        PgTokenRepository::create_tokens_tx(&mut *tx, event.id, tokens).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_event_by_id(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Event::try_from).transpose()
    }

    async fn query_events(&self, query: &EventQuery) -> Result<Vec<Event>, AppError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE 1=1"));

        if let Some(id) = query.id {
            qb.push(" AND id = ").push_bind(id);
        }
        if let Some(name) = query.name.as_deref().filter(|n| !n.is_empty()) {
            qb.push(" AND name ILIKE ")
                .push_bind(contains_pattern(name))
                .push(r" ESCAPE '\'");
        }
        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            qb.push(" AND category = ").push_bind(category.to_string());
        }
        if let Some(location) = query.location.as_deref().filter(|l| !l.is_empty()) {
            qb.push(" AND location = ").push_bind(location.to_string());
        }
        if let Some(from) = query.start_from {
            qb.push(" AND start_at >= ").push_bind(from);
        }
        if let Some(to) = query.start_to {
            qb.push(" AND start_at <= ").push_bind(to);
        }

        qb.push(" ORDER BY updated_at DESC LIMIT ")
            .push_bind(query.pagination.limit())
            .push(" OFFSET ")
            .push_bind(query.pagination.offset());

        let rows = qb
            .build_query_as::<EventRow>()
            .fetch_all(&self.pool)
            .await?;

        convert_all(rows)
    }

    async fn update_event_status(
        &self,
        id: Uuid,
        status: EventStatus,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE events SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("event '{id}' was not found")));
        }
        Ok(())
    }
}
