//! Error taxonomy and the non-fatal diagnostics channel
//!
//! Partial results beat aborted runs: everything that can be skipped is
//! recorded as a [`Diagnostic`] and the run continues. Only graph
//! invariant violations and unrecoverable collaborator failures abort.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ComponentId;

/// Fatal graph build failure — an invariant violation, never a
/// recoverable condition.
#[derive(Debug, Error)]
pub enum GraphBuildError {
    #[error("duplicate component id for group key '{group_key}'")]
    DuplicateComponent { group_key: String },
    #[error("edge references missing component ({from:?} -> {target:?})")]
    DanglingEdge {
        from: ComponentId,
        target: ComponentId,
    },
}

/// Why a file could not be turned into a source unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseFailure {
    /// No adapter registered for the file's language tag.
    UnsupportedLanguage { tag: String },
    /// Content is not valid UTF-8.
    InvalidEncoding,
    /// The grammar rejected the content.
    Malformed { reason: String },
    /// The per-file deadline elapsed.
    Timeout,
}

impl ParseFailure {
    pub fn reason(&self) -> String {
        match self {
            ParseFailure::UnsupportedLanguage { tag } => {
                format!("no adapter registered for language '{tag}'")
            }
            ParseFailure::InvalidEncoding => "content is not valid UTF-8".to_string(),
            ParseFailure::Malformed { reason } => reason.clone(),
            ParseFailure::Timeout => "parse timed out".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
}

/// Category of a non-fatal condition collected during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCode {
    UnsupportedLanguage,
    ParseError,
    UnresolvedReference,
    PatternRuleFailure,
    ImpactComputationTimeout,
    RenderingUnavailable,
    PersistenceFailure,
}

impl DiagnosticCode {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticCode::UnresolvedReference => Severity::Info,
            _ => Severity::Warning,
        }
    }
}

/// One non-fatal condition, returned alongside results so callers can
/// surface warnings without failing the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub path: Option<PathBuf>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            severity: code.severity(),
            message: message.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn parse_error(path: impl Into<PathBuf>, failure: &ParseFailure) -> Self {
        let code = match failure {
            ParseFailure::UnsupportedLanguage { .. } => DiagnosticCode::UnsupportedLanguage,
            _ => DiagnosticCode::ParseError,
        };
        Diagnostic::new(code, failure.reason()).with_path(path)
    }
}
