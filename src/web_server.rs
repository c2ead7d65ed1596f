use actix_web::{middleware, web, App, HttpServer};

use crate::api::auth::{auth_module, AuthenticationMiddleware};
use crate::api::scope_path;
use crate::api::user::user_module;
use crate::app_context::AppContext;

/// Registers the auth endpoints and the authenticated API scope.
pub fn configure_routes(cfg: &mut web::ServiceConfig, ctx: &web::Data<AppContext>) {
    let auth = &ctx.config.auth;
    cfg.app_data(ctx.clone())
        .service(auth_module(&auth.prefix))
        .service(
            web::scope(&scope_path(&auth.api_prefix))
                .wrap(AuthenticationMiddleware::new(ctx.sessions.clone()))
                .service(user_module()),
        );
}

pub async fn run_actix_server(ctx: AppContext) -> std::io::Result<()> {
    let bind = (ctx.config.server.host.clone(), ctx.config.server.port);
    let ctx = web::Data::new(ctx);

    log::info!("mimsrv serving on http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        let ctx = ctx.clone();
        App::new()
            // enable logger
            .wrap(middleware::Logger::default())
            .configure(move |cfg| configure_routes(cfg, &ctx))
    })
    .bind(bind)?
    .run()
    .await
}
