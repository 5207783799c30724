//! Error types for the session orchestrator.
//!
//! Only configuration validation fails fast. Everything that originates in
//! the editor or collaboration layer is caught at the session boundary and
//! re-emitted as an `exception` event carrying one of these values.

use thiserror::Error;

use crate::types::DocumentId;

/// Core error type for orchestrator operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Invalid or incomplete construction options (missing mount target)
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Collaboration transport or document fetch failure
    #[error("Network failure: {0}")]
    Network(String),

    /// An editor reported content it could not render
    #[error("Content error in document {document_id}: {message}")]
    Content {
        /// Owning document
        document_id: DocumentId,
        /// Editor-provided description
        message: String,
    },

    /// A per-editor serialization failed; no partial output is produced
    #[error("Export failed: {0}")]
    Export(String),

    /// Collaborative peers did not acknowledge an immediate save in time
    #[error("Save timed out with {pending} acknowledgment(s) outstanding")]
    SaveTimeout {
        /// Documents that never acknowledged
        pending: usize,
    },

    /// Referenced document is not part of the session
    #[error("Unknown document: {0}")]
    UnknownDocument(DocumentId),

    /// Editor is not bound to any document of the session
    #[error("Editor is not bound to any document of this session")]
    UnknownEditor,

    /// A document already has a bound editor
    #[error("Document {0} already has a bound editor")]
    EditorAlreadyBound(DocumentId),

    /// The session has been torn down
    #[error("Session has been destroyed")]
    Destroyed,

    /// Zip bundling failure
    #[error("Archive error: {0}")]
    Archive(String),

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(String),

    /// Malformed configuration or data
    #[error("Parse error: {0}")]
    Parse(String),

    /// Image upload failed or no uploader is configured
    #[error("Upload failed: {0}")]
    Upload(String),
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an export error.
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// Create a content error for a document.
    pub fn content(document_id: DocumentId, msg: impl Into<String>) -> Self {
        Self::Content {
            document_id,
            message: msg.into(),
        }
    }

    /// Returns the process exit code for this error.
    ///
    /// - 1: configuration or malformed input
    /// - 2: system failure (network, IO, archive, upload)
    /// - 3: not found
    /// - 4: invalid state
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Parse(_) => 1,
            Self::Network(_)
            | Self::Io(_)
            | Self::Archive(_)
            | Self::Upload(_)
            | Self::Export(_)
            | Self::SaveTimeout { .. } => 2,
            Self::UnknownDocument(_) | Self::UnknownEditor => 3,
            Self::Content { .. } | Self::EditorAlreadyBound(_) | Self::Destroyed => 4,
        }
    }

    /// Whether this error aborts session construction.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(format!("Failed to parse config: {err}"))
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_display() {
        let err = Error::configuration("selector is required");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: selector is required"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::configuration("x").exit_code(), 1);
        assert_eq!(Error::network("x").exit_code(), 2);
        assert_eq!(Error::SaveTimeout { pending: 1 }.exit_code(), 2);
        assert_eq!(Error::UnknownEditor.exit_code(), 3);
        assert_eq!(Error::Destroyed.exit_code(), 4);
    }

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(!Error::network("down").is_fatal());
        assert!(!Error::export("boom").is_fatal());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(msg) if msg.contains("gone")));
    }
}
