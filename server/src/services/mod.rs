pub mod booking;
pub mod event;
pub mod notification;
pub mod token;

pub use booking::{BookingConfig, BookingService};
pub use event::{EventLookup, EventService};
pub use notification::{ChannelTaskQueue, EnqueueError, NotificationService, TaskQueue};
pub use token::{TokenAllocator, TokenService};
