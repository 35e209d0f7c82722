use catalog::CatalogError;
use common::diag;
use common::error::diagnostics::DiagnosticMessage;
use std::error::Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The discovered catalog cannot be used. Nothing may be persisted.
    #[error("malformed schema: {context}")]
    MalformedSchema {
        context: DiagnosticMessage,
        #[source]
        source: CatalogError,
    },
    #[error("catalog error: {context}")]
    Catalog {
        context: DiagnosticMessage,
        #[source]
        source: CatalogError,
    },
    #[error("invalid non-breaking changes preference: {context}")]
    InvalidPreferenceConfiguration { context: DiagnosticMessage },
    #[error("connection not found: {context}")]
    ConnectionNotFound { context: DiagnosticMessage },
    #[error("collaborator failed: {context}")]
    Collaborator {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn Error + Send + Sync>>,
    },
}

impl ReconcileError {
    #[track_caller]
    pub fn invalid_preference(message: impl Into<String>) -> Self {
        Self::InvalidPreferenceConfiguration {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn connection_not_found(message: impl Into<String>) -> Self {
        Self::ConnectionNotFound {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::Collaborator {
            context: DiagnosticMessage::new(message.into()),
            source: None,
        }
    }

    #[track_caller]
    pub fn collaborator_with_source(
        message: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        Self::Collaborator {
            context: DiagnosticMessage::new(message.into()),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_malformed_schema(&self) -> bool {
        matches!(self, ReconcileError::MalformedSchema { .. })
    }
}

impl From<CatalogError> for ReconcileError {
    #[track_caller]
    fn from(err: CatalogError) -> Self {
        let context = diag!("{}", err);
        if err.is_malformed_schema() {
            ReconcileError::MalformedSchema {
                context,
                source: err,
            }
        } else {
            ReconcileError::Catalog {
                context,
                source: err,
            }
        }
    }
}
