use std::{borrow::Cow, fmt, panic::Location};

/// Human-friendly error message that automatically records the call-site.
///
/// Every error enum in the workspace carries one of these as its `context`.
/// Call [`DiagnosticMessage::new`] or the [`diag!`] macro to create an
/// instance; the macro allows inline formatting (e.g. `diag!("stream {} missing", key)`)
/// while capturing `file!()`/`line!()` when the error was constructed.
#[derive(Clone, Debug)]
pub struct DiagnosticMessage {
    message: Cow<'static, str>,
    location: &'static Location<'static>,
}

impl DiagnosticMessage {
    /// Create a message and record the caller location.
    #[track_caller]
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            location: Location::caller(),
        }
    }

    /// The message without the call-site suffix, suitable for user-facing output.
    pub fn message(&self) -> &str {
        self.message.as_ref()
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

/// Two diagnostics are equal when they say the same thing, wherever they were raised.
impl PartialEq for DiagnosticMessage {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
    }
}

impl fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (at {}:{})",
            self.message,
            self.location.file(),
            self.location.line()
        )
    }
}

/// Convenience macro for creating [`DiagnosticMessage`] values with `format!`
/// style syntax while capturing the file/line automatically.
#[macro_export]
macro_rules! diag {
    ($msg:literal $(,)?) => {
        $crate::error::diagnostics::DiagnosticMessage::new($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::diagnostics::DiagnosticMessage::new(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_appends_call_site() {
        let msg = DiagnosticMessage::new("stream public.users missing");
        let rendered = msg.to_string();
        assert!(rendered.starts_with("stream public.users missing (at "));
        assert!(rendered.contains("diagnostics.rs"));
    }

    #[test]
    fn diag_macro_formats_arguments() {
        let msg = crate::diag!("{} streams removed", 3);
        assert_eq!(msg.message(), "3 streams removed");
        assert_eq!(msg, DiagnosticMessage::new("3 streams removed"));
    }
}
