use actix_web::HttpResponse;

use crate::models::user::{Principal, PrincipalResp};

pub(crate) async fn current_user(principal: Principal) -> HttpResponse {
    HttpResponse::Ok().json(PrincipalResp::from(&principal))
}
