//! Background consumer of notification tasks.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::clients::{Email, EmailSender};
use crate::models::{NotificationTask, TaskType};
use crate::utils::clock::Clock;

pub struct EmailWorker {
    receiver: mpsc::Receiver<NotificationTask>,
    sender: Arc<dyn EmailSender>,
    clock: Arc<dyn Clock>,
    from: String,
}

impl EmailWorker {
    pub fn new(
        receiver: mpsc::Receiver<NotificationTask>,
        sender: Arc<dyn EmailSender>,
        clock: Arc<dyn Clock>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            receiver,
            sender,
            clock,
            from: from.into(),
        }
    }

    /// Drains the queue until it closes or `shutdown` resolves. Delayed
    /// tasks still waiting at shutdown are dropped.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        info!("Email worker started");
        let mut delayed = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(joined) = delayed.join_next(), if !delayed.is_empty() => {
                    if let Err(err) = joined {
                        error!(error = %err, "Delayed notification task panicked");
                    }
                }
                task = self.receiver.recv() => {
                    let Some(task) = task else { break };
                    self.dispatch(task, &mut delayed).await;
                }
            }
        }

        if !delayed.is_empty() {
            warn!(pending = delayed.len(), "Dropping delayed notifications on shutdown");
        }
        delayed.shutdown().await;
        info!("Email worker stopped");
    }

    async fn dispatch(&self, task: NotificationTask, delayed: &mut JoinSet<()>) {
        let email = compose(&self.from, &task);
        let wait = task
            .process_at
            .and_then(|at| (at - self.clock.now()).to_std().ok())
            .filter(|wait| !wait.is_zero());

        match wait {
            Some(wait) => {
                debug!(booking_id = %task.booking.id, ?wait, "Scheduling delayed notification");
                let sender = self.sender.clone();
                delayed.spawn(async move {
                    tokio::time::sleep(wait).await;
                    deliver(sender.as_ref(), &email).await;
                });
            }
            None => deliver(self.sender.as_ref(), &email).await,
        }
    }
}

async fn deliver(sender: &dyn EmailSender, email: &Email) {
    match sender.send_email(email).await {
        Ok(()) => debug!(recipient = %email.recipient, subject = %email.subject, "Email delivered"),
        Err(err) => error!(recipient = %email.recipient, error = %err, "Email delivery failed"),
    }
}

fn compose(from: &str, task: &NotificationTask) -> Email {
    let (subject, body) = match task.task_type {
        TaskType::SendConfirmationEmail => (
            format!("Booking confirmed: {}", task.event.name),
            format!(
                "Your booking {} for {} seat(s) at {} is confirmed. The event starts at {}.",
                task.booking.id, task.booking.quantity, task.event.name, task.event.start_at
            ),
        ),
        TaskType::SendReminderEmail => (
            format!("Reminder: {} is starting", task.event.name),
            format!(
                "{} starts at {} in {}. Booking {} holds {} seat(s).",
                task.event.name,
                task.event.start_at,
                task.event.location,
                task.booking.id,
                task.booking.quantity
            ),
        ),
    };

    Email {
        from: from.to_string(),
        recipient: task.user_id,
        subject,
        body,
    }
}
