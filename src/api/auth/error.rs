use actix_web::{
    http::{header::ContentType, StatusCode},
    HttpResponse, ResponseError,
};
use thiserror::Error;

// Every login failure maps to InvalidCredential and every session failure to
// InvalidToken; the specific cause is only logged.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid userid or nonce")]
    InvalidCredential,
    #[error("Invalid token")]
    InvalidToken,
}

impl ResponseError for AuthError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::plaintext())
            .body(self.to_string())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredential => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
        }
    }
}
