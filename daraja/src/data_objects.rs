use serde::{Deserialize, Serialize};
use sokoni_common::Cents;

/// The acknowledgement Daraja returns when an STK push request is accepted for processing.
///
/// Acceptance is not payment: the customer still has to approve the prompt on their phone, and the final outcome
/// arrives later on the callback url. The `checkout_request_id` is the correlation id that ties the two together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkPushAccepted {
    pub checkout_request_id: String,
    pub merchant_request_id: Option<String>,
    pub response_description: Option<String>,
}

/// The classified outcome of an inbound Daraja payment callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackOutcome {
    Success {
        correlation_id: String,
        receipt_number: String,
        amount: Option<Cents>,
        phone: Option<String>,
    },
    Failure {
        correlation_id: String,
        result_code: i64,
        result_desc: String,
    },
}

impl CallbackOutcome {
    pub fn correlation_id(&self) -> &str {
        match self {
            CallbackOutcome::Success { correlation_id, .. } => correlation_id,
            CallbackOutcome::Failure { correlation_id, .. } => correlation_id,
        }
    }
}
