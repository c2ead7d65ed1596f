use crate::models::sessions::SessionManager;
use crate::models::user::Principal;
use crate::rbac::Permission;

use super::error::AuthError;
use super::service::{self, TOKEN_COOKIE_NAME};

use std::future::{ready, Ready};
use std::sync::Arc;

use actix_web::body::EitherBody;
use actix_web::dev::Payload;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures_util::future::LocalBoxFuture;

// Gate for routes that need a logged-in user.
//
// A valid token cookie is refreshed, re-sent with the new expiry, and the
// session's principal is stored in the request extensions for the inner
// service. Anything else is answered with 401 without calling the inner
// service.
pub struct AuthenticationMiddleware(pub Arc<SessionManager>);

impl AuthenticationMiddleware {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self(sessions)
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthenticationMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticationMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationMiddlewareService {
            service,
            sessions: self.0.clone(),
        }))
    }
}

pub struct AuthenticationMiddlewareService<S> {
    service: S,
    sessions: Arc<SessionManager>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req.cookie(TOKEN_COOKIE_NAME);
        let client_fingerprint = service::client_fingerprint(req.headers());
        let session = service::current_session(
            &self.sessions,
            token.as_ref().map(|cookie| cookie.value()),
            &client_fingerprint,
        );

        let session = match session {
            Ok(session) => session,
            Err(e) => {
                let res = req.error_response(e).map_into_right_body();
                return Box::pin(async move { Ok(res) });
            }
        };

        let cookie = service::token_cookie(&session);
        req.extensions_mut().insert(session.principal);

        let fut = self.service.call(req);
        Box::pin(async move {
            let mut res = fut.await?;
            if let Err(e) = res.response_mut().add_cookie(&cookie) {
                log::warn!("failed to renew token cookie: {}", e);
            }
            Ok(res.map_into_left_body())
        })
    }
}

/// The principal attached by `AuthenticationMiddleware`, if any.
pub fn current_principal(req: &HttpRequest) -> Option<Principal> {
    req.extensions().get::<Principal>().cloned()
}

pub fn current_user_has_permission(req: &HttpRequest, perm: Permission) -> bool {
    current_principal(req).map_or(false, |principal| principal.has_permission(perm))
}

impl FromRequest for Principal {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(current_principal(req).ok_or(AuthError::InvalidToken))
    }
}
