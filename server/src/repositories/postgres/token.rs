use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::entity::{convert_all, TokenRow, TOKEN_COLUMNS};
use crate::models::{EventToken, TokenAvailability};
use crate::repositories::TokenRepository;
use crate::utils::error::AppError;

/// Claim scan. The CTE takes row locks with SKIP LOCKED, so concurrent claims
/// on the same event pick disjoint rows instead of queueing behind each other;
/// the UPDATE writes the lock before the transaction lets go of the rows.
/// A Locked token whose `locked_until` has passed qualifies like an Active one.
const CLAIM_TOKENS_SQL: &str = r#"
    WITH candidates AS (
        SELECT id
        FROM event_tokens
        WHERE event_id = $1
          AND status IN ('active', 'locked')
          AND (locked_until IS NULL OR locked_until < $2)
        ORDER BY created_at, id
        LIMIT $3
        FOR UPDATE SKIP LOCKED
    )
    UPDATE event_tokens t
    SET status = 'locked', holder_id = $4, locked_until = $5, updated_at = $2
    FROM candidates c
    WHERE t.id = c.id
    RETURNING t.token
"#;

#[derive(Clone)]
pub struct PgTokenRepository {
    pool: PgPool,
}

impl PgTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) async fn create_tokens_tx(
        conn: &mut PgConnection,
        event_id: Uuid,
        tokens: &[EventToken],
    ) -> Result<(), AppError> {
        let ids: Vec<Uuid> = tokens.iter().map(|t| t.id).collect();
        let values: Vec<String> = tokens.iter().map(|t| t.token.clone()).collect();
        let created: Vec<DateTime<Utc>> = tokens.iter().map(|t| t.created_at).collect();

        sqlx::query(
            r#"
            INSERT INTO event_tokens (id, event_id, token, status, created_at, updated_at)
            SELECT t.id, $1, t.token, 'active', t.created_at, t.created_at
            FROM UNNEST($2::uuid[], $3::text[], $4::timestamptz[]) AS t(id, token, created_at)
            "#,
        )
        .bind(event_id)
        .bind(ids)
        .bind(values)
        .bind(created)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Locked -> Used for tokens of `event_id` held by `holder_id`.
    pub(crate) async fn confirm_used_tokens_tx(
        conn: &mut PgConnection,
        event_id: Uuid,
        holder_id: Uuid,
        tokens: &[String],
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        if tokens.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE event_tokens
            SET status = 'used', locked_until = NULL, updated_at = $4
            WHERE token = ANY($1) AND event_id = $2 AND holder_id = $3 AND status = 'locked'
            "#,
        )
        .bind(tokens)
        .bind(event_id)
        .bind(holder_id)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    pub(crate) async fn release_tokens_tx(
        conn: &mut PgConnection,
        tokens: &[String],
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        if tokens.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE event_tokens
            SET status = 'active', holder_id = NULL, locked_until = NULL, updated_at = $2
            WHERE token = ANY($1) AND status = 'locked'
            "#,
        )
        .bind(tokens)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Locked or Used -> Active for tokens of `event_id` held by `holder_id`.
    pub(crate) async fn release_held_tokens_tx(
        conn: &mut PgConnection,
        event_id: Uuid,
        holder_id: Uuid,
        tokens: &[String],
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        if tokens.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE event_tokens
            SET status = 'active', holder_id = NULL, locked_until = NULL, updated_at = $4
            WHERE token = ANY($1) AND event_id = $2 AND holder_id = $3
              AND status IN ('locked', 'used')
            "#,
        )
        .bind(tokens)
        .bind(event_id)
        .bind(holder_id)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TokenRepository for PgTokenRepository {
    async fn get_by_token(&self, token: &str) -> Result<Option<EventToken>, AppError> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM event_tokens WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(EventToken::try_from).transpose()
    }

    async fn list_by_event(&self, event_id: Uuid) -> Result<Vec<EventToken>, AppError> {
        let rows = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM event_tokens WHERE event_id = $1 ORDER BY created_at, id"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn count_by_status(
        &self,
        event_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TokenAvailability, AppError> {
        let (active, locked, used, expired_locks) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'active'),
                COUNT(*) FILTER (WHERE status = 'locked'),
                COUNT(*) FILTER (WHERE status = 'used'),
                COUNT(*) FILTER (WHERE status = 'locked' AND locked_until < $2)
            FROM event_tokens
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(TokenAvailability {
            active,
            locked,
            used,
            expired_locks,
        })
    }

    async fn select_available_tokens(
        &self,
        holder_id: Uuid,
        event_id: Uuid,
        quantity: i64,
        locked_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, AppError> {
        let mut tx = self.pool.begin().await?;

        let tokens = sqlx::query_scalar::<_, String>(CLAIM_TOKENS_SQL)
            .bind(event_id)
            .bind(now)
            .bind(quantity)
            .bind(holder_id)
            .bind(locked_until)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(tokens)
    }

    async fn release_tokens(
        &self,
        tokens: &[String],
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        let released = Self::release_tokens_tx(&mut *tx, tokens, now).await?;
        tx.commit().await?;
        Ok(released)
    }

    async fn release_held_tokens(
        &self,
        event_id: Uuid,
        holder_id: Uuid,
        tokens: &[String],
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        let released =
            Self::release_held_tokens_tx(&mut *tx, event_id, holder_id, tokens, now).await?;
        tx.commit().await?;
        Ok(released)
    }
}
