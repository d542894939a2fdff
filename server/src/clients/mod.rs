pub mod email;
pub mod payment;

pub use email::{Email, EmailError, EmailSender, NoopEmailSender};
pub use payment::{NoopPaymentGateway, PaymentGateway, PaymentGatewayError};
