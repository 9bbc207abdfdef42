/// JWT authentication middleware for Bearer token validation
/// Extracts user_id from token claims and adds it to request extensions
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use uuid::Uuid;

use crate::security::jwt::TokenIssuer;

/// User ID extracted from the access token
#[derive(Debug, Clone)]
pub struct UserId(pub Uuid);

/// JWT authentication middleware factory. The issuer is constructor-injected
/// so routes under test can carry throwaway secrets.
pub struct JwtAuth {
    issuer: TokenIssuer,
}

impl JwtAuth {
    pub fn new(issuer: TokenIssuer) -> Self {
        Self { issuer }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtAuthService {
            service: Rc::new(service),
            issuer: self.issuer.clone(),
        }))
    }
}

pub struct JwtAuthService<S> {
    service: Rc<S>,
    issuer: TokenIssuer,
}

impl<S, B> Service<ServiceRequest> for JwtAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let issuer = self.issuer.clone();

        Box::pin(async move {
            // Read headers into owned data before touching extensions_mut,
            // so no RefCell borrows are live across the mutable access.
            let auth_header = match req.headers().get("Authorization") {
                Some(header) => match header.to_str() {
                    Ok(h) => h.to_string(),
                    Err(_) => {
                        return Err(ErrorUnauthorized("Invalid Authorization header"));
                    }
                },
                None => {
                    return Err(ErrorUnauthorized("Missing Authorization header"));
                }
            };

            let token = match auth_header.strip_prefix("Bearer ") {
                Some(t) => t,
                None => {
                    return Err(ErrorUnauthorized(
                        "Invalid Authorization scheme, expected Bearer",
                    ));
                }
            };

            let user_id = match issuer.validate_access(token) {
                Ok(claims) => match Uuid::parse_str(&claims.sub) {
                    Ok(id) => id,
                    Err(_) => {
                        return Err(ErrorUnauthorized("Invalid user ID in token"));
                    }
                },
                Err(e) => {
                    tracing::debug!("Token validation failed: {}", e);
                    return Err(ErrorUnauthorized("Invalid or expired token"));
                }
            };

            req.extensions_mut().insert(UserId(user_id));

            let res = service.call(req).await?;
            Ok(res)
        })
    }
}

/// Extractor for authenticated routes. Uses the identity the middleware
/// stashed in extensions when present; otherwise validates the Bearer token
/// itself against the state-held issuer, so individual routes can require
/// auth without wrapping a whole scope.
impl FromRequest for UserId {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        if let Some(user_id) = req.extensions().get::<UserId>().cloned() {
            return ready(Ok(user_id));
        }

        let Some(state) = req.app_data::<actix_web::web::Data<crate::AppState>>() else {
            return ready(Err(ErrorUnauthorized("Authentication unavailable")));
        };

        ready(authenticate(&state.tokens, req.headers()).map(UserId))
    }
}

fn authenticate(
    issuer: &TokenIssuer,
    headers: &actix_web::http::header::HeaderMap,
) -> Result<Uuid, Error> {
    let auth_header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ErrorUnauthorized("Missing Authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ErrorUnauthorized("Invalid Authorization scheme, expected Bearer"))?;

    let claims = issuer.validate_access(token).map_err(|e| {
        tracing::debug!("Token validation failed: {}", e);
        ErrorUnauthorized("Invalid or expired token")
    })?;

    Uuid::parse_str(&claims.sub).map_err(|_| ErrorUnauthorized("Invalid user ID in token"))
}
