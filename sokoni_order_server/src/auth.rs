//! Access token handling.
//!
//! Authentication itself (login, OTP, session issuance) belongs to the identity service; this server only *verifies*
//! the HS256 JWTs it issues. A token carries the actor's id, their role, and the hub they are assigned to if they
//! are hub staff. The ACL middleware decodes the token once per request and parks the claims in the request
//! extensions, where handlers pick them up through the [`JwtClaims`] extractor.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sokoni_order_engine::db_types::Role;

use crate::{config::AuthConfig, errors::AuthError, errors::ServerError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id, as assigned by the identity service.
    pub sub: i64,
    pub role: Role,
    /// Present only for hub staff: the hub this actor is allowed to act on.
    pub hub_id: Option<i64>,
    pub exp: usize,
}

#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        Self { decoding_key, validation }
    }

    pub fn verify(&self, token: &str) -> Result<JwtClaims, AuthError> {
        decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::ValidationError(e.to_string()))
    }
}

/// Extracts the bearer token from the `Authorization` header.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        // The ACL middleware has usually decoded the token already.
        if let Some(claims) = req.extensions().get::<JwtClaims>() {
            return ready(Ok(claims.clone()));
        }
        let result = match (bearer_token(req), req.app_data::<actix_web::web::Data<TokenVerifier>>()) {
            (Some(token), Some(verifier)) => verifier.verify(&token).map_err(ServerError::from),
            (None, _) => Err(ServerError::from(AuthError::MissingToken)),
            (_, None) => Err(ServerError::Unspecified("No token verifier is configured".to_string())),
        };
        ready(result)
    }
}

/// Mints access tokens the same way the identity service does. Used by local development tooling and the endpoint
/// tests; the production server never issues tokens.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { encoding_key: EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes()) }
    }

    pub fn issue_token(&self, user_id: i64, role: Role, hub_id: Option<i64>) -> Result<String, AuthError> {
        let exp = (chrono::Utc::now() + chrono::Duration::hours(24)).timestamp() as usize;
        let claims = JwtClaims { sub: user_id, role, hub_id, exp };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AuthError::ValidationError(e.to_string()))
    }
}
