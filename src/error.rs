//! Error types shared by every stage of type synthesis.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::loader::ModuleId;

/// A single toolchain diagnostic, as reported by `rustc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {}", self.file, self.line, self.column, self.message)
    }
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("invalid schema: {0}")]
    Validation(String),

    #[error("no generated definition exists for type `{0}`")]
    NotFound(String),

    #[error("type `{0}` has already been generated")]
    AlreadyExists(String),

    #[error("field `{field}` already exists on type `{type_name}`")]
    DuplicateField { type_name: String, field: String },

    #[error("reference field `{0}` requires a reference type")]
    InvalidReference(String),

    #[error("type `{0}` is not loaded; generate it before referencing it")]
    UnknownReferenceType(String),

    #[error("compilation failed with {} error(s):\n{}", .diagnostics.len(), render_diagnostics(.diagnostics))]
    Compilation { diagnostics: Vec<Diagnostic> },

    #[error("type `{type_name}` not found in compiled module {module}")]
    TypeNotFound { type_name: String, module: ModuleId },

    #[error("malformed source for type `{type_name}`: {reason}")]
    MalformedSource { type_name: String, reason: String },

    #[error("failed to invoke toolchain `{program}`: {source}")]
    Toolchain {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load module {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ForgeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(type_name: &str, reason: impl Into<String>) -> Self {
        Self::MalformedSource {
            type_name: type_name.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable name of the error category, used in structured responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::NotFound(_) => "NotFound",
            Self::AlreadyExists(_) => "AlreadyExists",
            Self::DuplicateField { .. } => "DuplicateField",
            Self::InvalidReference(_) => "InvalidReference",
            Self::UnknownReferenceType(_) => "UnknownReferenceType",
            Self::Compilation { .. } => "CompilationError",
            Self::TypeNotFound { .. } => "TypeNotFound",
            Self::MalformedSource { .. } => "MalformedSource",
            Self::Toolchain { .. } => "ToolchainError",
            Self::Load { .. } => "LoadError",
            Self::Io { .. } => "IoError",
            Self::Config(_) => "ConfigError",
        }
    }

    /// Whether the error signals a broken contract between synthesizer and
    /// compiler rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::TypeNotFound { .. } | Self::MalformedSource { .. })
    }
}

/// Structured error body reported to callers.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub kind: &'static str,
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl From<&ForgeError> for ErrorResponse {
    fn from(err: &ForgeError) -> Self {
        let diagnostics = match err {
            ForgeError::Compilation { diagnostics } => diagnostics.clone(),
            _ => Vec::new(),
        };
        Self {
            kind: err.kind(),
            error: err.to_string(),
            diagnostics,
        }
    }
}

pub type Result<T, E = ForgeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compilation_error_lists_every_diagnostic() {
        let err = ForgeError::Compilation {
            diagnostics: vec![
                Diagnostic {
                    file: "lib.rs".into(),
                    line: 4,
                    column: 9,
                    message: "cannot find type `Ghost` in this scope".into(),
                },
                Diagnostic {
                    file: "lib.rs".into(),
                    line: 7,
                    column: 1,
                    message: "expected `;`".into(),
                },
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.starts_with("compilation failed with 2 error(s)"));
        assert!(rendered.contains("lib.rs:4:9: cannot find type `Ghost` in this scope"));
        assert!(rendered.contains("lib.rs:7:1: expected `;`"));
    }

    #[test]
    fn error_response_carries_kind_and_diagnostics() {
        let err = ForgeError::Compilation {
            diagnostics: vec![Diagnostic {
                file: "lib.rs".into(),
                line: 1,
                column: 1,
                message: "boom".into(),
            }],
        };
        let response = ErrorResponse::from(&err);
        assert_eq!(response.kind, "CompilationError");
        assert_eq!(response.diagnostics.len(), 1);

        let response = ErrorResponse::from(&ForgeError::NotFound("Ghost".into()));
        assert_eq!(response.kind, "NotFound");
        assert!(response.diagnostics.is_empty());
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("diagnostics"));
    }

    #[test]
    fn consistency_faults_are_internal() {
        assert!(ForgeError::malformed("Employee", "no struct").is_internal());
        assert!(!ForgeError::NotFound("Employee".into()).is_internal());
    }
}
