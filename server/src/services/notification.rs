//! Post-confirmation notifications, handed off to a background queue.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::models::{Booking, Event, NotificationTask, TaskType};

#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("task queue is full")]
    Full,

    #[error("task queue is closed")]
    Closed,
}

/// Fire-and-forget task submission. Implementations must not block.
pub trait TaskQueue: Send + Sync {
    fn enqueue(&self, task: NotificationTask) -> Result<(), EnqueueError>;
}

/// Bounded in-process queue drained by [`crate::workers::EmailWorker`].
#[derive(Debug, Clone)]
pub struct ChannelTaskQueue {
    sender: mpsc::Sender<NotificationTask>,
}

impl ChannelTaskQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<NotificationTask>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl TaskQueue for ChannelTaskQueue {
    fn enqueue(&self, task: NotificationTask) -> Result<(), EnqueueError> {
        self.sender.try_send(task).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }
}

pub struct NotificationService {
    queue: Arc<dyn TaskQueue>,
}

impl NotificationService {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self { queue }
    }

    /// Queues the confirmation email and the event-start reminder. Failures
    /// are logged and otherwise ignored.
    pub fn booking_confirmed(&self, event: &Event, booking: &Booking) {
        let tasks = [
            NotificationTask {
                task_type: TaskType::SendConfirmationEmail,
                user_id: booking.user_id,
                event: event.clone(),
                booking: booking.clone(),
                process_at: None,
            },
            NotificationTask {
                task_type: TaskType::SendReminderEmail,
                user_id: booking.user_id,
                event: event.clone(),
                booking: booking.clone(),
                process_at: Some(event.start_at),
            },
        ];

        for task in tasks {
            let task_type = task.task_type;
            match self.queue.enqueue(task) {
                Ok(()) => debug!(booking_id = %booking.id, ?task_type, "Notification queued"),
                Err(err) => warn!(
                    booking_id = %booking.id,
                    ?task_type,
                    error = %err,
                    "Failed to queue notification"
                ),
            }
        }
    }
}
