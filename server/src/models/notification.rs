use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::booking::Booking;
use crate::models::event::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    SendConfirmationEmail,
    SendReminderEmail,
}

/// A post-confirmation notification. Delivery is at-least-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTask {
    pub task_type: TaskType,
    pub user_id: Uuid,
    pub event: Event,
    pub booking: Booking,
    /// Not delivered before this instant. `None` means immediately.
    pub process_at: Option<DateTime<Utc>>,
}
