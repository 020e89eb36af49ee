//! Error types for the fignum library.

use thiserror::Error;

/// Result type alias for fignum operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while numbering and styling figures.
#[derive(Error, Debug)]
pub enum Error {
    /// The controller was used before `init()` or after `destroy()`.
    #[error("controller is not initialized")]
    NotInitialized,

    /// An operation needed a current document but none is set.
    #[error("no current document")]
    NoCurrentDocument,

    /// A document id was empty or otherwise unusable.
    #[error("invalid document id: {0:?}")]
    InvalidDocumentId(String),

    /// The document access client failed (fetch, attributes, query).
    #[error("document client error: {0}")]
    Client(String),

    /// A structured query could not be executed or decoded.
    #[error("structured query error: {0}")]
    Query(String),

    /// Stylesheet application failed (empty input, detached host).
    #[error("style application error: {0}")]
    Style(String),

    /// A physical stylesheet id is not tracked by the applicator.
    #[error("unknown stylesheet id: {0}")]
    UnknownStyle(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures coming from the external document client.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Client(_) | Error::Query(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NoCurrentDocument;
        assert_eq!(err.to_string(), "no current document");

        let err = Error::Client("connection refused".to_string());
        assert_eq!(err.to_string(), "document client error: connection refused");
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::Client("x".into()).is_client_error());
        assert!(Error::Query("x".into()).is_client_error());
        assert!(!Error::Style("x".into()).is_client_error());
    }
}
