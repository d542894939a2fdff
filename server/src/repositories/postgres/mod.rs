//! PostgreSQL stores. Multi-row mutations take one transaction each; the
//! `*_tx` helpers run inside a caller's transaction.

mod booking;
mod entity;
mod event;
mod item;
mod token;

pub use booking::PgBookingRepository;
pub use event::PgEventRepository;
pub use token::PgTokenRepository;
