pub mod booking;
pub mod event;
pub mod notification;
pub mod pagination;
pub mod payment;
pub mod token;

pub use booking::{Booking, BookingItem, BookingStatus};
pub use event::{Event, EventQuery, EventStatus};
pub use notification::{NotificationTask, TaskType};
pub use pagination::Pagination;
pub use payment::{Payment, PaymentRequest};
pub use token::{EventToken, TokenAvailability, TokenStatus};
