use actix_web::{web, HttpRequest, HttpResponse, Result};

use crate::app_context::AppContext;

use super::{
    dtos::LoginStatus,
    service::{self, TOKEN_COOKIE_NAME},
};

// Route: `/auth/login/` (any method)
pub(crate) async fn login(
    req: HttpRequest,
    ctx: web::Data<AppContext>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let form = service::login_form(&req, &body);
    let client_fingerprint = service::client_fingerprint(req.headers());
    let session = service::login(&ctx, form, &client_fingerprint)?;
    Ok(HttpResponse::Ok()
        .cookie(service::token_cookie(&session))
        .json(LoginStatus::logged_in(&session.principal)))
}

// Route: `/auth/logout/`
pub(crate) async fn logout(req: HttpRequest, ctx: web::Data<AppContext>) -> HttpResponse {
    let token = req.cookie(TOKEN_COOKIE_NAME);
    service::logout(&ctx, token.as_ref().map(|cookie| cookie.value()));
    HttpResponse::Ok()
        .cookie(service::expired_token_cookie())
        .json(serde_json::json!({ "status": "ok" }))
}

// Route: `/auth/status/`
pub(crate) async fn status(req: HttpRequest, ctx: web::Data<AppContext>) -> HttpResponse {
    let token = req.cookie(TOKEN_COOKIE_NAME);
    let client_fingerprint = service::client_fingerprint(req.headers());
    match service::current_session(
        &ctx.sessions,
        token.as_ref().map(|cookie| cookie.value()),
        &client_fingerprint,
    ) {
        Ok(session) => HttpResponse::Ok()
            .cookie(service::token_cookie(&session))
            .json(LoginStatus::logged_in(&session.principal)),
        Err(_) => HttpResponse::Ok().json(LoginStatus::logged_out()),
    }
}
