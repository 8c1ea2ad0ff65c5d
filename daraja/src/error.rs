use thiserror::Error;

#[derive(Debug, Error)]
pub enum DarajaApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not obtain a Daraja access token: {0}")]
    AuthTokenError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("STK push rejected. Error {code}. {message}")]
    PushRejected { code: String, message: String },
    #[error("Invalid phone number: {0}")]
    InvalidMsisdn(String),
    #[error("Callback envelope is malformed: {0}")]
    InvalidEnvelope(String),
}
