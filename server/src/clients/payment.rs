//! Payment collaborator. The booking lifecycle only needs `create_payment`;
//! processor integration lives behind this trait.

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::payment::{Payment, PaymentRequest};
use crate::utils::error::AppError;

#[derive(Debug, Error)]
pub enum PaymentGatewayError {
    #[error("payment declined: {0}")]
    Declined(String),

    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

impl From<PaymentGatewayError> for AppError {
    fn from(err: PaymentGatewayError) -> Self {
        AppError::ExternalServiceError(err.to_string())
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<Payment, PaymentGatewayError>;
}

/// Accepts every payment and logs it.
#[derive(Debug, Clone, Default)]
pub struct NoopPaymentGateway;

#[async_trait]
impl PaymentGateway for NoopPaymentGateway {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<Payment, PaymentGatewayError> {
        info!(
            booking_id = %request.booking_id,
            amount = %request.amount,
            currency = %request.currency,
            "Creating payment"
        );

        Ok(Payment {
            id: format!("pay_{}", Uuid::new_v4().simple()),
            booking_id: request.booking_id,
            amount: request.amount,
            currency: request.currency.clone(),
            status: "succeeded".to_string(),
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_noop_gateway_echoes_request() {
        let request = PaymentRequest {
            booking_id: Uuid::new_v4(),
            amount: Decimal::new(5000, 2),
            currency: "USD".into(),
        };
        let payment = NoopPaymentGateway.create_payment(&request).await.unwrap();

        assert_eq!(payment.booking_id, request.booking_id);
        assert_eq!(payment.amount, request.amount);
        assert!(payment.id.starts_with("pay_"));
    }

    #[test]
    fn test_gateway_error_maps_to_external_service_error() {
        let err: AppError = PaymentGatewayError::Declined("card expired".into()).into();
        assert!(matches!(err, AppError::ExternalServiceError(msg) if msg.contains("card expired")));
    }
}
