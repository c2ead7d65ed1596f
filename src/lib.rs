//! mimsrv: photo browsing server, authentication core.
//!
//! Users log in by proving knowledge of their password with a time-boxed
//! nonce; the server answers with a bearer token cookie that slides forward
//! on activity until a hard expiry.
//!
//! - [`models`] - password file, digests and nonces, sessions
//! - [`api`] - actix-web login/logout/status endpoints and the auth gate
//! - [`rbac`] - permissions and per-route permission guards

pub mod admin;
pub mod api;
pub mod app_context;
pub mod args;
pub mod config_loader;
pub mod models;
pub mod rbac;
pub mod web_server;
