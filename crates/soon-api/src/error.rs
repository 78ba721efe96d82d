//! Maps domain and rendering failures onto HTTP responses.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use soon_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebError {
    #[error(transparent)]
    Domain(#[from] AppError),

    #[error("template rendering failed: {0}")]
    Template(#[from] askama::Error),
}

impl ResponseError for WebError {
    fn status_code(&self) -> StatusCode {
        match self {
            WebError::Domain(AppError::NotFound(..)) => StatusCode::NOT_FOUND,
            WebError::Domain(AppError::ValidationError(_)) => StatusCode::BAD_REQUEST,
            WebError::Domain(AppError::Unauthorized(_)) => StatusCode::UNAUTHORIZED,
            WebError::Domain(AppError::Conflict(_)) => StatusCode::CONFLICT,
            WebError::Domain(AppError::Transport(_)) => StatusCode::BAD_GATEWAY,
            WebError::Domain(AppError::Internal(_)) | WebError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = if status.is_server_error() {
            log::error!("{self}");
            "Something went wrong. Please try again later.".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status)
            .content_type("text/plain; charset=utf-8")
            .body(body)
    }
}
