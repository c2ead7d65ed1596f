use actix_web::cookie::{time::OffsetDateTime, Cookie};
use actix_web::http::header::{self, HeaderMap};
use actix_web::{web, HttpMessage, HttpRequest};

use crate::app_context::AppContext;
use crate::models::sessions::{SessionDetails, SessionManager};

use super::{dtos::LoginForm, error::AuthError};

pub const TOKEN_COOKIE_NAME: &str = "MIMSRV_TOKEN";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

fn parse_login_fields(source: &str, input: &str) -> LoginForm {
    match web::Query::<LoginForm>::from_query(input) {
        Ok(fields) => fields.into_inner(),
        Err(e) => {
            log::debug!("ignoring malformed login {}: {}", source, e);
            LoginForm::default()
        }
    }
}

/// Collects the login fields from a urlencoded body and the query string,
/// on any method. A field present in both is taken from the body.
/// Anything unreadable counts as absent, so it fails the nonce check.
pub(crate) fn login_form(req: &HttpRequest, body: &[u8]) -> LoginForm {
    let query = parse_login_fields("query", req.query_string());
    if !req.content_type().eq_ignore_ascii_case(FORM_CONTENT_TYPE) || body.is_empty() {
        return query;
    }
    match std::str::from_utf8(body) {
        Ok(body) => parse_login_fields("body", body).or(query),
        Err(e) => {
            log::debug!("ignoring non-utf8 login body: {}", e);
            query
        }
    }
}

pub(crate) fn login(
    ctx: &AppContext,
    form: LoginForm,
    client_fingerprint: &str,
) -> Result<SessionDetails, AuthError> {
    let seconds = match form.time.trim().parse::<i64>() {
        Ok(seconds) => seconds,
        Err(e) => {
            log::warn!("error converting login time '{}': {}", form.time, e);
            0
        }
    };

    let principal = ctx
        .validator
        .validate(&form.userid, &form.nonce, seconds)
        .map_err(|e| {
            log::info!("login rejected for '{}': {}", form.userid, e);
            AuthError::InvalidCredential
        })?;

    let session = ctx.sessions.issue(principal, client_fingerprint);
    log::info!("user '{}' logged in", form.userid);
    Ok(session)
}

pub(crate) fn logout(ctx: &AppContext, token_key: Option<&str>) {
    if let Some(session) = token_key.and_then(|key| ctx.sessions.revoke(key)) {
        log::info!("user '{}' logged out", session.principal.userid());
    }
}

/// Resolves the request's token and, when valid, slides its idle deadline.
pub(crate) fn current_session(
    sessions: &SessionManager,
    token_key: Option<&str>,
    client_fingerprint: &str,
) -> Result<SessionDetails, AuthError> {
    let key = token_key.ok_or(AuthError::InvalidToken)?;
    sessions
        .resolve_and_refresh(key, client_fingerprint)
        .map_err(|e| {
            log::debug!("rejecting session token: {}", e);
            AuthError::InvalidToken
        })
}

// The browser drops the cookie at the same moment the server stops
// accepting the token.
pub(crate) fn token_cookie(session: &SessionDetails) -> Cookie<'static> {
    let mut cookie = Cookie::build(TOKEN_COOKIE_NAME, session.key.clone())
        .path("/")
        .http_only(true)
        .finish();
    match i64::try_from(session.idle_deadline).map(OffsetDateTime::from_unix_timestamp) {
        Ok(Ok(expires)) => cookie.set_expires(expires),
        _ => log::warn!("idle deadline {} out of cookie range", session.idle_deadline),
    }
    cookie
}

pub(crate) fn expired_token_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(TOKEN_COOKIE_NAME, "")
        .path("/")
        .http_only(true)
        .finish();
    cookie.make_removal();
    cookie
}

pub(crate) fn client_fingerprint(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
