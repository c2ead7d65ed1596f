pub mod auth;
pub(crate) mod user;

// Route prefixes are configured with a trailing slash ("/auth/"); actix
// scopes are given without one.
pub(crate) fn scope_path(prefix: &str) -> String {
    prefix.trim_end_matches('/').to_string()
}
