//! Unified error handling for model compilation and document normalization
//!
//! Field-level problems degrade to nulls and diagnostics; only document-level
//! structural violations and derived-type-name collisions surface here. Every
//! structural variant carries the full dot-path of the offending location.

use thiserror::Error;

/// Unified error type for compile and normalize passes.
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// Required top-level document metadata is missing or malformed
    #[error("Malformed document at {path}: {reason}")]
    MalformedDocument { path: String, reason: String },

    /// Two different shapes were registered under one canonical type name
    #[error("Schema conflict: type {type_name} re-registered with a different shape at {path}")]
    SchemaConflict { type_name: String, path: String },

    /// A model definition is structurally invalid
    #[error("Invalid model at {path}: {reason}")]
    InvalidModel { path: String, reason: String },

    /// A compiler operation was invoked in the wrong lifecycle state
    #[error("Compiler state error: expected {expected}, found {actual}")]
    CompilerState { expected: String, actual: String },

    /// A delegated file download failed and the active policy escalates it
    #[error("Download failed for field {path}: {reason}")]
    DownloadFailed { path: String, reason: String },

    /// An internal operation failed in a way that indicates a bug
    #[error("Operation failed: {operation} - {reason}")]
    OperationFailed { operation: String, reason: String },

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl NormalizeError {
    /// Create a MalformedDocument error
    pub fn malformed_document(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a SchemaConflict error
    pub fn schema_conflict(type_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::SchemaConflict {
            type_name: type_name.into(),
            path: path.into(),
        }
    }

    /// Create an InvalidModel error
    pub fn invalid_model(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidModel {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a CompilerState error
    pub fn compiler_state(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::CompilerState {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a DownloadFailed error
    pub fn download_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DownloadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an OperationFailed error
    pub fn operation_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for compile and normalize operations
pub type Result<T> = std::result::Result<T, NormalizeError>;

/// Severity of a non-fatal finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DiagnosticLevel {
    Info,
    Warning,
}

/// A non-fatal finding observed during a pass.
///
/// Diagnostics are collected as values on the pass output (and mirrored to
/// the log) so callers can act on them programmatically.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    /// Dot-path of the location the finding concerns
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    pub fn info(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation_helpers() {
        let error = NormalizeError::malformed_document("id", "missing");
        assert!(error.to_string().contains("id"));
        assert!(error.to_string().contains("missing"));

        let error = NormalizeError::schema_conflict("PageDataType", "page.data.body");
        assert!(error.to_string().contains("PageDataType"));
        assert!(error.to_string().contains("page.data.body"));
    }

    #[test]
    fn test_serde_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: NormalizeError = json_error.into();
        assert!(matches!(error, NormalizeError::Serde(_)));
    }
}
