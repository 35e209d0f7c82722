use common::error::diagnostics::DiagnosticMessage;
use std::error::Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("job history unavailable: {context}")]
    HistoryUnavailable {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn Error + Send + Sync>>,
    },
    #[error("configuration error: {context}")]
    ConfigError { context: DiagnosticMessage },
}

impl StatusError {
    #[track_caller]
    pub fn history_unavailable(message: impl Into<String>) -> Self {
        Self::HistoryUnavailable {
            context: DiagnosticMessage::new(message.into()),
            source: None,
        }
    }

    #[track_caller]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            context: DiagnosticMessage::new(message.into()),
        }
    }
}
