use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::error::AppError;

/// Allocation state of one seat. `Used` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Active,
    Locked,
    Used,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Active => "active",
            TokenStatus::Locked => "locked",
            TokenStatus::Used => "used",
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TokenStatus::Active),
            "locked" => Ok(TokenStatus::Locked),
            "used" => Ok(TokenStatus::Used),
            other => Err(AppError::InternalServerError(format!(
                "unknown token status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventToken {
    pub id: Uuid,
    pub event_id: Uuid,
    pub token: String,
    pub status: TokenStatus,
    pub holder_id: Option<Uuid>,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventToken {
    /// A fresh, unheld seat for `event_id`.
    pub fn new(event_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            token: Uuid::new_v4().to_string(),
            status: TokenStatus::Active,
            holder_id: None,
            locked_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a claim scan at `now` may take this token. A lapsed lock counts as free.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            TokenStatus::Used => false,
            TokenStatus::Active | TokenStatus::Locked => {
                self.locked_until.map_or(true, |until| until < now)
            }
        }
    }

    pub fn is_held_by(&self, holder_id: Uuid) -> bool {
        self.holder_id == Some(holder_id)
    }

    pub fn lock(&mut self, holder_id: Uuid, until: DateTime<Utc>, now: DateTime<Utc>) {
        self.status = TokenStatus::Locked;
        self.holder_id = Some(holder_id);
        self.locked_until = Some(until);
        self.updated_at = now;
    }

    pub fn release(&mut self, now: DateTime<Utc>) {
        self.status = TokenStatus::Active;
        self.holder_id = None;
        self.locked_until = None;
        self.updated_at = now;
    }

    pub fn mark_used(&mut self, now: DateTime<Utc>) {
        self.status = TokenStatus::Used;
        self.locked_until = None;
        self.updated_at = now;
    }
}

/// Seat counts for one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAvailability {
    pub active: i64,
    pub locked: i64,
    pub used: i64,
    /// Locked tokens whose lock has lapsed; included in `locked`.
    pub expired_locks: i64,
}

impl TokenAvailability {
    pub fn claimable(&self) -> i64 {
        self.active + self.expired_locks
    }

    pub fn total(&self) -> i64 {
        self.active + self.locked + self.used
    }
}
