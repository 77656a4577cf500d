use crate::derivation::{ParseError, RunError};
use std::path::{Path, PathBuf};

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

impl DiagnosticLevel {
    pub fn as_str(&self) -> &str {
        match self {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
        }
    }
}

/// Source code location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub length: Option<usize>, // Character length of the span
}

impl Location {
    pub fn new(file: &Path, line: usize, column: usize) -> Self {
        Self {
            file: file.to_path_buf(),
            line,
            column,
            length: None,
        }
    }
}

/// Derivation diagnostic
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub location: Location,
    pub level: DiagnosticLevel,
    pub message: String,
    pub code: Option<String>, // e.g., "E001"
}

impl Diagnostic {
    /// Create an error diagnostic
    pub fn error(location: Location, message: String) -> Self {
        Self {
            location,
            level: DiagnosticLevel::Error,
            message,
            code: None,
        }
    }

    /// Create a warning diagnostic
    pub fn warning(location: Location, message: String) -> Self {
        Self {
            location,
            level: DiagnosticLevel::Warning,
            message,
            code: None,
        }
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }

    /// Syntax error in a derivation script
    pub fn parse_error(file: &Path, err: &ParseError) -> Self {
        Self::error(Location::new(file, err.line, err.column), err.message.clone()).with_code("E100")
    }

    /// Failed derivation step
    pub fn run_error(file: &Path, err: &RunError) -> Self {
        Self::error(Location::new(file, err.line, err.column), err.kind.to_string())
            .with_code(err.kind.code())
    }

    /// Script that never extracts a scheme
    pub fn nothing_extracted(file: &Path) -> Self {
        Self::warning(
            Location::new(file, 1, 1),
            "derivation has no `extract` step".to_string(),
        )
        .with_code("W001")
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}
