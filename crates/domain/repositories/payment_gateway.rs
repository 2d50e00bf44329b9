use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::payment_gateway::{GatewayValidation, PaymentInitRequest};

#[async_trait]
#[automock]
pub trait PaymentGateway {
    /// Returns the hosted-checkout URL.
    async fn init_payment(&self, request: PaymentInitRequest) -> Result<String>;
    async fn validate_transaction(&self, val_id: String) -> Result<GatewayValidation>;
}
