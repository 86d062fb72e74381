use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keysweep_core::{RotationError, StoreError};
use serde::Serialize;
use thiserror::Error;

use crate::telemetry::{CORRELATION_ID_HEADER, CorrelationId, correlation_header_value};

#[derive(Debug, Error)]
pub enum AppErrorKind {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("secret store unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
#[error("{kind}")]
pub struct AppError {
    kind: AppErrorKind,
    correlation_id: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            correlation_id: None,
        }
    }

    pub fn with_correlation(mut self, id: String) -> Self {
        self.correlation_id = Some(id);
        self
    }

    pub fn kind(&self) -> &AppErrorKind {
        &self.kind
    }

    pub fn status(&self) -> StatusCode {
        match self.kind {
            AppErrorKind::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppErrorKind::Forbidden(_) => StatusCode::FORBIDDEN,
            AppErrorKind::Unavailable(_) | AppErrorKind::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn bad_request<T: Into<String>>(message: T) -> Self {
        Self::new(AppErrorKind::BadRequest(message.into()))
    }

    pub fn forbidden<T: Into<String>>(message: T) -> Self {
        Self::new(AppErrorKind::Forbidden(message.into()))
    }

    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::new(AppErrorKind::Internal(message.into()))
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    correlation_id: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let correlation = self.correlation_id.clone();
        let body = Json(ErrorBody {
            error: match &self.kind {
                AppErrorKind::BadRequest(_) => "bad_request",
                AppErrorKind::Forbidden(_) => "forbidden",
                AppErrorKind::Unavailable(_) => "store_unavailable",
                AppErrorKind::Internal(_) => "internal",
            },
            message: self.kind.to_string(),
            correlation_id: correlation.as_deref(),
        });

        let mut response = (status, body).into_response();
        if let Some(value) = correlation.as_deref().and_then(correlation_header_value) {
            response.headers_mut().insert(CORRELATION_ID_HEADER, value);
        }
        response
    }
}

impl From<RotationError> for AppError {
    fn from(value: RotationError) -> Self {
        let kind = match value {
            RotationError::InvalidMode(_)
            | RotationError::MissingOldValue
            | RotationError::MissingNewValue => AppErrorKind::BadRequest(value.to_string()),
            RotationError::StoreUnavailable(err) => AppErrorKind::Unavailable(err.to_string()),
        };
        AppError::new(kind)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        let kind = match value {
            StoreError::Unavailable(_) | StoreError::Transport(_) => {
                AppErrorKind::Unavailable(value.to_string())
            }
            _ => AppErrorKind::Internal(value.to_string()),
        };
        AppError::new(kind)
    }
}

pub fn attach_correlation(err: AppError, correlation: &CorrelationId) -> AppError {
    err.with_correlation(correlation.0.clone())
}
