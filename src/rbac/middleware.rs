use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::Error as ActixError,
    http::StatusCode,
    HttpMessage, HttpResponse,
};
use futures_util::future::LocalBoxFuture;
use futures_util::future::{ready, Ready};

use crate::models::user::Principal;
use crate::rbac::Permission;

#[derive(Debug)]
pub enum AuthorizationError {
    Unauthenticated,
    Forbidden(String),
}

impl std::fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "User not authenticated"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
        }
    }
}

impl actix_web::error::ResponseError for AuthorizationError {
    fn error_response(&self) -> HttpResponse {
        match self {
            Self::Unauthenticated => HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "unauthorized",
                "message": self.to_string()
            })),
            Self::Forbidden(_) => HttpResponse::Forbidden().json(serde_json::json!({
                "error": "forbidden",
                "message": self.to_string()
            })),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

/// Requires the authenticated principal to hold `required_permission`.
/// Must sit inside `AuthenticationMiddleware`, which attaches the principal.
#[derive(Clone, Copy)]
pub struct AuthorizationMiddleware {
    pub required_permission: Permission,
}

impl<S, B> Transform<S, ServiceRequest> for AuthorizationMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type InitError = ();
    type Transform = AuthorizationMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthorizationMiddlewareService {
            service,
            required_permission: self.required_permission,
        }))
    }
}

pub struct AuthorizationMiddlewareService<S> {
    service: S,
    required_permission: Permission,
}

impl<S, B> Service<ServiceRequest> for AuthorizationMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let principal = req.extensions().get::<Principal>().cloned();
        let denied = match principal {
            None => Some(AuthorizationError::Unauthenticated),
            Some(principal) if !principal.has_permission(self.required_permission) => {
                log::warn!(
                    "Authorization DENIED for user '{}' requiring {:?} on {}",
                    principal.userid(),
                    self.required_permission,
                    req.path()
                );
                Some(AuthorizationError::Forbidden(format!(
                    "User '{}' does not have permission {:?}",
                    principal.userid(),
                    self.required_permission
                )))
            }
            Some(_) => None,
        };

        if let Some(e) = denied {
            let res = req.error_response(e).map_into_right_body();
            return Box::pin(async move { Ok(res) });
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}
