//! Translation of failures into HTTP responses.
//!
//! Bodies are plain text. Unexpected failures are logged in full and reported
//! to the caller with a generic message only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::any::Any;
use thiserror::Error;

use crate::weather::service::WeatherError;

pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Weather(#[from] WeatherError),

    #[error("Unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            AppError::Weather(err @ WeatherError::CityNotFound(_)) => {
                (StatusCode::NOT_FOUND, err.to_string()).into_response()
            }
            AppError::Weather(err @ WeatherError::Upstream(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
            AppError::Unexpected(err) => {
                tracing::error!("Unhandled error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, UNEXPECTED_ERROR_MESSAGE).into_response()
            }
        }
    }
}

/// Response for a handler that panicked.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "panic with non-string payload".to_string()
    };

    AppError::Unexpected(anyhow::anyhow!("handler panicked: {}", detail)).into_response()
}
