use actix_web::{web, Resource};
mod controller;

// Route: `/api/user/`, behind AuthenticationMiddleware
pub(crate) fn user_module() -> Resource {
    web::resource(["/user", "/user/"]).route(web::get().to(controller::current_user))
}
