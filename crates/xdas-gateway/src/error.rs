//! Request-level error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced by the request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid keyspace: {0}")]
    UnknownKeyspace(String),

    /// Inbound Content-Type/Content-Encoding does not match the
    /// keyspace's configured input format.
    #[error("invalid content format")]
    InvalidContentFormat,

    /// Body failed the content validation unpack.
    #[error("invalid request body: {0}")]
    InvalidContent(String),

    /// Unmappable `format=` query parameter.
    #[error("unknown output format: {0}")]
    UnknownFormat(String),

    #[error("not found")]
    NotFound,

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("conversion failed: {0}")]
    Conversion(String),

    #[error("redis read error: {0}")]
    RedisRead(String),

    #[error("redis write error: {0}")]
    RedisWrite(String),
}

impl ApiError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownKeyspace(_)
            | Self::InvalidContentFormat
            | Self::InvalidContent(_)
            | Self::UnknownFormat(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Conversion(_) | Self::RedisRead(_) | Self::RedisWrite(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal detail stays in the logs; the distinct read/write tags
        // make 500s attributable from the client side.
        let body = match &self {
            Self::UnknownKeyspace(_) => "Invalid keyspace\n",
            Self::InvalidContentFormat | Self::InvalidContent(_) | Self::UnknownFormat(_) => {
                "Bad Request\n"
            }
            Self::NotFound => "Not Found\n",
            Self::PayloadTooLarge => "Request Entity Too Large\n",
            Self::RedisRead(_) => "Internal Server Error 10\n",
            Self::RedisWrite(_) => "Internal Server Error 11\n",
            Self::Conversion(_) => "Internal Server Error\n",
        };
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::UnknownKeyspace("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::PayloadTooLarge.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::Conversion("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::RedisRead("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_is_not_leaked() {
        let response = ApiError::RedisWrite("password@host refused".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
