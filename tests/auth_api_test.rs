use std::fs;
use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App, HttpRequest, HttpResponse};
use serde_json::Value;
use tempfile::TempDir;

use mimsrv::api::auth::{current_user_has_permission, AuthenticationMiddleware, TOKEN_COOKIE_NAME};
use mimsrv::app_context::AppContext;
use mimsrv::config_loader::Config;
use mimsrv::models::clock::MockClock;
use mimsrv::models::crypto::{derive_digest, derive_nonce};
use mimsrv::rbac::guards::require_edit;
use mimsrv::rbac::Permission;
use mimsrv::web_server::configure_routes;

const T0: u64 = 1_700_000_000;
const HOUR: u64 = 60 * 60;
const AGENT: &str = "mimview-test/1.0";

struct Fixture {
    _dir: TempDir,
    clock: Arc<MockClock>,
    ctx: web::Data<AppContext>,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("passwd.txt");
    fs::write(
        &path,
        format!(
            "user1,{}\nuser2,{},edit\n",
            derive_digest("user1", "pw1"),
            derive_digest("user2", "pw2")
        ),
    )
    .unwrap();

    let mut config = Config::default();
    config.auth.password_file = path;
    let clock = Arc::new(MockClock::new(T0));
    let ctx = web::Data::new(AppContext::with_clock(config, clock.clone()).unwrap());
    Fixture {
        _dir: dir,
        clock,
        ctx,
    }
}

async fn edit_only(req: HttpRequest) -> HttpResponse {
    assert!(current_user_has_permission(&req, Permission::CanEdit));
    HttpResponse::Ok().body("edited")
}

macro_rules! init_app {
    ($fx:expr) => {{
        let ctx = $fx.ctx.clone();
        let sessions = ctx.sessions.clone();
        test::init_service(
            App::new()
                .configure(move |cfg| configure_routes(cfg, &ctx))
                .service(
                    web::scope("/edit")
                        .wrap(require_edit())
                        .wrap(AuthenticationMiddleware::new(sessions))
                        .route("", web::post().to(edit_only)),
                ),
        )
        .await
    }};
}

fn login_request(userid: &str, password: &str, seconds: u64) -> test::TestRequest {
    let nonce = derive_nonce(userid, &derive_digest(userid, password), seconds as i64);
    let time = seconds.to_string();
    test::TestRequest::post()
        .uri("/auth/login/")
        .insert_header((header::USER_AGENT, AGENT))
        .set_form([("userid", userid), ("nonce", nonce.as_str()), ("time", time.as_str())])
}

fn token_cookie<B>(resp: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|c| c.name() == TOKEN_COOKIE_NAME)
        .map(|c| c.into_owned())
}

#[actix_web::test]
async fn test_login_sets_token_cookie() {
    let fx = fixture();
    let app = init_app!(fx);

    let resp = test::call_service(&app, login_request("user1", "pw1", T0).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookie = token_cookie(&resp).expect("login should set a token cookie");
    assert!(!cookie.value().is_empty());
    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(
        cookie.expires_datetime().map(|t| t.unix_timestamp()),
        Some((T0 + HOUR) as i64)
    );

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["LoggedIn"], true);
    assert_eq!(body["Permissions"], "");
}

#[actix_web::test]
async fn test_login_reports_permissions() {
    let fx = fixture();
    let app = init_app!(fx);

    let resp = test::call_service(&app, login_request("user2", "pw2", T0).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["Permissions"], "edit");
}

#[actix_web::test]
async fn test_login_failures_are_uniform() {
    let fx = fixture();
    let app = init_app!(fx);

    // wrong password
    let resp = test::call_service(&app, login_request("user1", "nope", T0).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(token_cookie(&resp).is_none());
    let wrong_password = test::read_body(resp).await;

    // unknown user
    let resp = test::call_service(&app, login_request("user9", "pw1", T0).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(token_cookie(&resp).is_none());
    let unknown_user = test::read_body(resp).await;
    assert_eq!(wrong_password, unknown_user);

    // correct nonce but the claimed time is too far from the server clock
    fx.clock.set(T0 + 3);
    let resp = test::call_service(&app, login_request("user1", "pw1", T0).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(token_cookie(&resp).is_none());

    // unparsable time
    let req = test::TestRequest::post()
        .uri("/auth/login/")
        .set_form([("userid", "user1"), ("nonce", "abc"), ("time", "soon")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // missing fields
    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_form([("userid", "user1")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_login_without_form_body_is_unauthorized() {
    let fx = fixture();
    let app = init_app!(fx);

    let req = test::TestRequest::post().uri("/auth/login/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(token_cookie(&resp).is_none());

    let nonce = derive_nonce("user1", &derive_digest("user1", "pw1"), T0 as i64);
    let req = test::TestRequest::post()
        .uri("/auth/login/")
        .set_json(serde_json::json!({ "userid": "user1", "nonce": nonce, "time": T0.to_string() }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(token_cookie(&resp).is_none());

    let req = test::TestRequest::put()
        .uri("/auth/login/")
        .insert_header((header::CONTENT_TYPE, "application/x-www-form-urlencoded"))
        .set_payload("userid=%ZZ&&=")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_login_reads_query_string_on_any_method() {
    let fx = fixture();
    let app = init_app!(fx);

    let nonce = derive_nonce("user1", &derive_digest("user1", "pw1"), T0 as i64);
    let req = test::TestRequest::get()
        .uri(&format!("/auth/login/?userid=user1&nonce={}&time={}", nonce, T0))
        .insert_header((header::USER_AGENT, AGENT))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(token_cookie(&resp).is_some());

    let req = test::TestRequest::get()
        .uri("/auth/login/?userid=user1&nonce=abc&time=1")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_login_body_fields_override_query() {
    let fx = fixture();
    let app = init_app!(fx);

    let nonce = derive_nonce("user2", &derive_digest("user2", "pw2"), T0 as i64);
    let time = T0.to_string();
    let req = test::TestRequest::post()
        .uri("/auth/login/?userid=user1&nonce=wrong")
        .insert_header((header::USER_AGENT, AGENT))
        .set_form([("userid", "user2"), ("nonce", nonce.as_str()), ("time", time.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["Permissions"], "edit");
}

#[actix_web::test]
async fn test_login_within_clock_skew() {
    let fx = fixture();
    let app = init_app!(fx);

    fx.clock.set(T0 + 2);
    let resp = test::call_service(&app, login_request("user1", "pw1", T0).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_status_refreshes_cookie() {
    let fx = fixture();
    let app = init_app!(fx);

    let req = test::TestRequest::get().uri("/auth/status/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(token_cookie(&resp).is_none());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["LoggedIn"], false);
    assert!(body.get("Permissions").is_none());

    let resp = test::call_service(&app, login_request("user2", "pw2", T0).to_request()).await;
    let cookie = token_cookie(&resp).unwrap();

    fx.clock.set(T0 + HOUR / 2);
    let req = test::TestRequest::get()
        .uri("/auth/status")
        .insert_header((header::USER_AGENT, AGENT))
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    let renewed = token_cookie(&resp).expect("status should renew the cookie");
    assert_eq!(renewed.value(), cookie.value());
    assert_eq!(
        renewed.expires_datetime().map(|t| t.unix_timestamp()),
        Some((T0 + HOUR / 2 + HOUR) as i64)
    );
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["LoggedIn"], true);
    assert_eq!(body["Permissions"], "edit");
}

#[actix_web::test]
async fn test_require_auth() {
    let fx = fixture();
    let app = init_app!(fx);

    let req = test::TestRequest::get().uri("/api/user/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(&app, login_request("user1", "pw1", T0).to_request()).await;
    let cookie = token_cookie(&resp).unwrap();

    let req = test::TestRequest::get()
        .uri("/api/user/")
        .insert_header((header::USER_AGENT, AGENT))
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(token_cookie(&resp).is_some());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["Userid"], "user1");
    assert_eq!(body["Permissions"], "");

    // same token from a different client
    let req = test::TestRequest::get()
        .uri("/api/user/")
        .insert_header((header::USER_AGENT, "someone-else"))
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // idle window passes with no activity
    fx.clock.set(T0 + HOUR + 1);
    let req = test::TestRequest::get()
        .uri("/api/user/")
        .insert_header((header::USER_AGENT, AGENT))
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_activity_cannot_outlive_hard_expiry() {
    let fx = fixture();
    let app = init_app!(fx);

    let resp = test::call_service(&app, login_request("user1", "pw1", T0).to_request()).await;
    let cookie = token_cookie(&resp).unwrap();

    for step in 1..=9 {
        fx.clock.set(T0 + step * HOUR - 60);
        let req = test::TestRequest::get()
            .uri("/api/user/")
            .insert_header((header::USER_AGENT, AGENT))
            .cookie(cookie.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "request at hour {}", step);
    }

    fx.clock.set(T0 + 10 * HOUR + 1);
    let req = test::TestRequest::get()
        .uri("/api/user/")
        .insert_header((header::USER_AGENT, AGENT))
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_logout_clears_cookie_and_session() {
    let fx = fixture();
    let app = init_app!(fx);

    let resp = test::call_service(&app, login_request("user1", "pw1", T0).to_request()).await;
    let cookie = token_cookie(&resp).unwrap();

    let req = test::TestRequest::post()
        .uri("/auth/logout/")
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cleared = token_cookie(&resp).expect("logout should overwrite the cookie");
    assert_eq!(cleared.value(), "");
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");

    let req = test::TestRequest::get()
        .uri("/api/user/")
        .insert_header((header::USER_AGENT, AGENT))
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // logging out without a session still succeeds
    let req = test::TestRequest::get().uri("/auth/logout").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_permission_guard() {
    let fx = fixture();
    let app = init_app!(fx);

    let req = test::TestRequest::post().uri("/edit").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(&app, login_request("user1", "pw1", T0).to_request()).await;
    let viewer = token_cookie(&resp).unwrap();
    let req = test::TestRequest::post()
        .uri("/edit")
        .insert_header((header::USER_AGENT, AGENT))
        .cookie(viewer)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(&app, login_request("user2", "pw2", T0).to_request()).await;
    let editor = token_cookie(&resp).unwrap();
    let req = test::TestRequest::post()
        .uri("/edit")
        .insert_header((header::USER_AGENT, AGENT))
        .cookie(editor)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(test::read_body(resp).await, "edited");
}
