//! The seam between the order server and the mobile-money gateway.
//!
//! Checkout talks to the gateway through the [`PushPaymentClient`] trait so that endpoint tests can stand in a mock;
//! the production implementation is a thin adapter over [`daraja::DarajaApi`].
use async_trait::async_trait;
use daraja::DarajaApi;
use sokoni_common::Cents;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct PushPaymentError(pub String);

#[async_trait]
pub trait PushPaymentClient: Send + Sync {
    /// Initiates a push payment on the customer's phone and returns the gateway's correlation id. The actual payment
    /// outcome arrives later, on the callback route.
    async fn initiate_push_payment(
        &self,
        phone: &str,
        amount: Cents,
        account_reference: &str,
        description: &str,
    ) -> Result<String, PushPaymentError>;
}

#[async_trait]
impl PushPaymentClient for DarajaApi {
    async fn initiate_push_payment(
        &self,
        phone: &str,
        amount: Cents,
        account_reference: &str,
        description: &str,
    ) -> Result<String, PushPaymentError> {
        self.initiate_stk_push(phone, amount, account_reference, description)
            .await
            .map(|accepted| accepted.checkout_request_id)
            .map_err(|e| PushPaymentError(e.to_string()))
    }
}
