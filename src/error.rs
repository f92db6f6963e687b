use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;
use tracing::error;

use crate::review::ReviewError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized")
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", "resource not found")
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", error.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            code: self.code,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl From<ReviewError> for AppError {
    fn from(value: ReviewError) -> Self {
        let status = match &value {
            ReviewError::Conflict(_)
            | ReviewError::AlreadyLocked { .. }
            | ReviewError::NotLocked { .. }
            | ReviewError::NotPending { .. } => StatusCode::CONFLICT,
            ReviewError::UnknownRole(_) => StatusCode::FORBIDDEN,
            ReviewError::NotFound(_) => StatusCode::NOT_FOUND,
            ReviewError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ReviewError::Storage(err) => {
                error!(error = %err, "review store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        AppError::new(status, value.code(), value.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<crate::store::StoreError> for AppError {
    fn from(value: crate::store::StoreError) -> Self {
        ReviewError::from(value).into()
    }
}
