use actix_web::{web, Scope};
pub(crate) mod authentication_middleware;
mod controller;
mod dtos;
mod error;
mod service;

pub use authentication_middleware::{
    current_principal, current_user_has_permission, AuthenticationMiddleware,
};
pub use error::AuthError;
pub use service::TOKEN_COOKIE_NAME;

/// Login, logout and status endpoints mounted under `prefix` (e.g. `/auth/`).
pub(crate) fn auth_module(prefix: &str) -> Scope {
    web::scope(&super::scope_path(prefix))
        .service(web::resource(["/login", "/login/"]).to(controller::login))
        .service(web::resource(["/logout", "/logout/"]).to(controller::logout))
        .service(web::resource(["/status", "/status/"]).to(controller::status))
}
