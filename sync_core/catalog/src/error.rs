use common::diag;
use common::error::diagnostics::DiagnosticMessage;
use common::types::StreamKey;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("malformed schema: {context}")]
    MalformedSchema { context: DiagnosticMessage },
    #[error("duplicate stream: {context}")]
    Duplicate { context: DiagnosticMessage },
    #[error("catalog lookup failed: {context}")]
    NotFound { context: DiagnosticMessage },
    #[error("invalid patch: {context}")]
    InvalidPatch { context: DiagnosticMessage },
    #[error("serde json error: {context}")]
    SerdeJson {
        context: DiagnosticMessage,
        #[source]
        source: serde_json::Error,
    },
    #[error("I/O error: {context}")]
    Io {
        context: DiagnosticMessage,
        #[source]
        source: io::Error,
    },
}

impl CatalogError {
    #[track_caller]
    pub fn malformed_schema(message: impl Into<String>) -> Self {
        Self::MalformedSchema {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn malformed_stream(stream: &StreamKey, message: impl Into<String>) -> Self {
        Self::MalformedSchema {
            context: DiagnosticMessage::new(format!("stream '{stream}': {}", message.into())),
        }
    }

    #[track_caller]
    pub fn duplicate(stream: &StreamKey) -> Self {
        Self::Duplicate {
            context: diag!("Stream '{}' appears more than once", stream),
        }
    }

    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn invalid_patch(stream: &StreamKey, message: impl Into<String>) -> Self {
        Self::InvalidPatch {
            context: DiagnosticMessage::new(format!("stream '{stream}': {}", message.into())),
        }
    }

    /// Whether the error means the discovered schema itself cannot be used.
    pub fn is_malformed_schema(&self) -> bool {
        matches!(
            self,
            CatalogError::MalformedSchema { .. } | CatalogError::Duplicate { .. }
        )
    }
}

impl From<serde_json::Error> for CatalogError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        CatalogError::SerdeJson {
            context: DiagnosticMessage::new(err.to_string()),
            source: err,
        }
    }
}

impl From<io::Error> for CatalogError {
    #[track_caller]
    fn from(err: io::Error) -> Self {
        CatalogError::Io {
            context: DiagnosticMessage::new(err.to_string()),
            source: err,
        }
    }
}
