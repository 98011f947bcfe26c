use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, info};

use crate::storage::StorageError;

pub type AppResult<T> = Result<T, AppError>;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which side of the request is at fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, unknown id, missing or wrong identity.
    Client,
    /// Storage, draw backend or rasterizer failures.
    Backend,
}

/// Error carried through the dispatcher and rendered as a plain text response.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Client { status: StatusCode, message: String },
    #[error("{message}: {cause}")]
    Backend {
        message: String,
        #[source]
        cause: BoxError,
    },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Client {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Missing identity and non-owner writes share this status.
    pub fn unauthorized() -> Self {
        Self::Client {
            status: StatusCode::UNAUTHORIZED,
            message: "nope".to_string(),
        }
    }

    pub fn backend(message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::Backend {
            message: message.into(),
            cause: cause.into(),
        }
    }

    /// Unknown elections are a client error; everything else the database
    /// reports is a backend failure described by `message`.
    pub fn storage(message: impl Into<String>, err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => Self::bad_request("no item"),
            other => Self::backend(message, other),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Client { .. } => ErrorKind::Client,
            Self::Backend { .. } => ErrorKind::Backend,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Client { status, .. } => *status,
            Self::Backend { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Client { message, .. } => {
                info!(status = status.as_u16(), %message, "request rejected");
                message
            }
            Self::Backend { message, cause } => {
                error!(status = status.as_u16(), %message, error = %cause, "backend failure");
                message
            }
        };

        (status, [(header::CONTENT_TYPE, "text/plain")], message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_client_error() {
        let err = AppError::storage("db get fail", StorageError::NotFound(3));
        assert_eq!(err.kind(), ErrorKind::Client);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "no item");
    }

    #[test]
    fn database_failures_are_backend_errors() {
        let err = AppError::storage("db put fail", StorageError::Database(sqlx::Error::PoolClosed));
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("db put fail"));
    }

    #[test]
    fn unauthorized_is_401() {
        let err = AppError::unauthorized();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "nope");
    }
}
