// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Gateway errors as HTTP responses.
//!
//! | error                         | status | body                 |
//! |-------------------------------|--------|----------------------|
//! | invalid parameter             | 422    | `{"error": message}` |
//! | request shape, batch size     | 400    | message, plain text  |
//! | unknown legacy index          | 404    | message, plain text  |
//! | engine timeout                | 503    | `Elasticsearch timed out` |
//! | other engine or schema errors | 500    | message, plain text  |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, warn};

use crate::engine::EngineError;
use crate::gateway::GatewayError;
use crate::params::ParseError;

pub const TIMEOUT_MESSAGE: &str = "Elasticsearch timed out";

/// Response wrapper for [`GatewayError`].
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            GatewayError::Parse(ParseError::Invalid(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::Parse(ParseError::BadRequest(_)) | GatewayError::BatchTooLarge(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::UnknownIndex(_) => StatusCode::NOT_FOUND,
            GatewayError::Engine(EngineError::Timeout) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Engine(_) | GatewayError::Schema(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_client_error() {
            debug!(status = status.as_u16(), error = %self.0, "Request rejected");
        } else {
            warn!(status = status.as_u16(), kind = self.0.kind(), "Request failed");
        }
        match self.0 {
            GatewayError::Parse(ParseError::Invalid(message)) => {
                (status, Json(json!({ "error": message }))).into_response()
            }
            GatewayError::Engine(EngineError::Timeout) => (status, TIMEOUT_MESSAGE).into_response(),
            other => (status, other.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statuses() {
        let status = |err: GatewayError| ApiError(err).status();
        assert_eq!(
            status(ParseError::Invalid("x".into()).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(ParseError::BadRequest("Query must be less than 1024 words".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(GatewayError::BatchTooLarge(10)), StatusCode::BAD_REQUEST);
        assert_eq!(status(GatewayError::UnknownIndex("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(EngineError::Timeout.into()), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status(EngineError::MalformedResponse("no hits".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_plain_text_bodies() {
        let response = ApiError(GatewayError::BatchTooLarge(10)).into_response();
        assert_eq!(
            response.headers()[axum::http::header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        let response = ApiError(ParseError::Invalid("bad".into()).into()).into_response();
        assert_eq!(response.headers()[axum::http::header::CONTENT_TYPE], "application/json");
    }
}
