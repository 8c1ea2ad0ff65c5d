use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use sokoni_order_engine::FulfillmentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Payment gateway error. {0}")]
    GatewayError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::NoHubAssigned => StatusCode::BAD_REQUEST,
            },
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    MissingToken,
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("You are not assigned to any hub.")]
    NoHubAssigned,
}

impl From<FulfillmentError> for ServerError {
    fn from(e: FulfillmentError) -> Self {
        match e {
            FulfillmentError::DatabaseError(msg) => Self::BackendError(format!("Database error: {msg}")),
            FulfillmentError::Validation(_) |
            FulfillmentError::EmptyCart |
            FulfillmentError::ProductUnavailable(_) |
            FulfillmentError::HubUnavailable => Self::ValidationError(e.to_string()),
            FulfillmentError::OrderNotFound(_) |
            FulfillmentError::SubOrderNotFound(_) |
            FulfillmentError::ProductNotFound(_) |
            FulfillmentError::RefundNotFound(_) => Self::NoRecordFound(e.to_string()),
            FulfillmentError::Forbidden(_) => Self::InsufficientPermissions(e.to_string()),
            FulfillmentError::InvalidTransition { .. } |
            FulfillmentError::InsufficientStock { .. } |
            FulfillmentError::AlreadyCancelled(_) |
            FulfillmentError::NotCancellable { .. } |
            FulfillmentError::RefundStateConflict(..) => Self::Conflict(e.to_string()),
        }
    }
}
