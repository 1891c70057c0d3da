// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use thiserror::Error;

use crate::engine::EngineError;
use crate::params::ParseError;
use crate::schema::SchemaError;

/// Everything a gateway call can fail with.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Client input was rejected before any engine call
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Maximum of {0} searches per batch")]
    BatchTooLarge(usize),

    #[error("Unknown index \"{0}\"")]
    UnknownIndex(String),

    #[error("invalid field schema: {0}")]
    Schema(#[from] SchemaError),
}

impl GatewayError {
    /// Label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(ParseError::Invalid(_)) => "invalid",
            Self::Parse(ParseError::BadRequest(_)) | Self::BatchTooLarge(_) => "bad_request",
            Self::UnknownIndex(_) => "not_found",
            Self::Engine(EngineError::Timeout) => "timeout",
            Self::Engine(_) => "engine",
            Self::Schema(_) => "schema",
        }
    }

    /// Client errors are not logged above debug.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Parse(_) | Self::BatchTooLarge(_) | Self::UnknownIndex(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_message() {
        assert_eq!(
            GatewayError::BatchTooLarge(10).to_string(),
            "Maximum of 10 searches per batch"
        );
    }

    #[test]
    fn test_parse_message_passes_through() {
        let err: GatewayError = ParseError::Invalid("Unexpected parameters: foo".into()).into();
        assert_eq!(err.to_string(), "Unexpected parameters: foo");
        assert_eq!(err.kind(), "invalid");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_engine_kinds() {
        assert_eq!(GatewayError::from(EngineError::Timeout).kind(), "timeout");
        let err = GatewayError::from(EngineError::Unavailable("refused".into()));
        assert_eq!(err.kind(), "engine");
        assert!(!err.is_client_error());
    }
}
