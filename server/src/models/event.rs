use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::pagination::Pagination;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Active,
    Inactive,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Active => "active",
            EventStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EventStatus::Active),
            "inactive" => Ok(EventStatus::Inactive),
            other => Err(AppError::InternalServerError(format!(
                "unknown event status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub available_seats: i32,
    pub start_at: DateTime<Utc>,
    pub location: String,
    pub category: String,
    pub price: Decimal,
    pub currency: String,
    pub status: EventStatus,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_active(&self) -> bool {
        self.status == EventStatus::Active
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start_at < now
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    pub available_seats: i32,
    pub start_at: DateTime<Utc>,
    pub location: String,
    pub category: String,
    pub price: Decimal,
}

impl CreateEventRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::ValidationError("name must not be empty".into()));
        }
        if self.available_seats < 1 {
            return Err(AppError::ValidationError(
                "available_seats must be at least 1".into(),
            ));
        }
        if self.price.is_sign_negative() {
            return Err(AppError::ValidationError(
                "price must not be negative".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateEventRequest {
    pub status: EventStatus,
}

/// Filters for event search. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventQuery {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub start_from: Option<DateTime<Utc>>,
    pub start_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pagination: Pagination,
}

impl EventQuery {
    pub fn validate(&self) -> Result<(), AppError> {
        if let (Some(from), Some(to)) = (self.start_from, self.start_to) {
            if from > to {
                return Err(AppError::ValidationError(
                    "start_from must be before start_to".into(),
                ));
            }
        }
        self.pagination.validate()
    }

    /// Same predicate the SQL query applies, for stores that filter in memory.
    pub fn matches(&self, event: &Event) -> bool {
        if self.id.is_some_and(|id| id != event.id) {
            return false;
        }
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            if !event.name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            if event.category != category {
                return false;
            }
        }
        if let Some(location) = self.location.as_deref().filter(|l| !l.is_empty()) {
            if event.location != location {
                return false;
            }
        }
        if self.start_from.is_some_and(|from| event.start_at < from) {
            return false;
        }
        if self.start_to.is_some_and(|to| event.start_at > to) {
            return false;
        }
        true
    }
}
