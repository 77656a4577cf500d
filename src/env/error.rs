use crate::types::{Kind, Term, Variable};
use thiserror::Error;

/// Failure of an environment operation. The input environment is never
/// modified when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("unknown variable `{0}`")]
    UnknownVariable(Variable),

    #[error("variable `{var}` is already bound to `{existing}`")]
    DoubleBinding { var: Variable, existing: Term },

    #[error("malformed scheme: {0}")]
    MalformedScheme(String),

    #[error("kind mismatch: `{term}` is {found} but {expected} was expected")]
    KindMismatch {
        term: Term,
        expected: Kind,
        found: Kind,
    },

    #[error("binding `{var}` to `{value}` would make it refer to itself")]
    CyclicBinding { var: Variable, value: Term },
}

impl EnvError {
    /// Stable diagnostic code
    pub fn code(&self) -> &'static str {
        match self {
            EnvError::UnknownVariable(_) => "E001",
            EnvError::DoubleBinding { .. } => "E002",
            EnvError::MalformedScheme(_) => "E003",
            EnvError::KindMismatch { .. } => "E004",
            EnvError::CyclicBinding { .. } => "E005",
        }
    }

    pub(crate) fn kind_mismatch(term: &Term, expected: Kind) -> Self {
        EnvError::KindMismatch {
            term: term.clone(),
            expected,
            found: term.kind(),
        }
    }
}
