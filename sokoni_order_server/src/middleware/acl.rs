//! Access control middleware for the order server.
//! This middleware can be placed on any route or service.
//!
//! It verifies the bearer token on the incoming request against the identity service's signing secret and then
//! checks the role claim against the roles the route requires. On success the decoded claims are stored in the
//! request extensions for handlers to extract; otherwise the request is answered with 401/403.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
    HttpMessage,
};
use futures::{
    future::{ok, Ready},
    Future,
};
use sokoni_order_engine::db_types::Role;

use crate::{
    auth::{bearer_token, TokenVerifier},
    errors::{AuthError, ServerError},
};

pub struct AclMiddlewareFactory {
    required_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    /// The request is allowed through when the token's role matches *any* of `required_roles`.
    pub fn new(required_roles: &[Role]) -> Self {
        AclMiddlewareFactory { required_roles: required_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AclMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { required_roles: self.required_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    required_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let required_roles = self.required_roles.clone();
        Box::pin(async move {
            let verifier = req
                .app_data::<web::Data<TokenVerifier>>()
                .ok_or_else(|| {
                    log::error!("No token verifier found in app data");
                    ServerError::Unspecified("No token verifier is configured".to_string())
                })?
                .clone();
            let token = bearer_token(req.request()).ok_or(ServerError::AuthenticationError(AuthError::MissingToken))?;
            let claims = verifier.verify(&token).map_err(ServerError::AuthenticationError)?;
            if !required_roles.contains(&claims.role) {
                return Err(ServerError::AuthenticationError(AuthError::InsufficientPermissions(format!(
                    "The {} role may not call this endpoint",
                    claims.role
                )))
                .into());
            }
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}
