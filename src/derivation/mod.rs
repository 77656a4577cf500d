//! Derivation scripts: a line-oriented text format driving the engine
//!
//! ```text
//! instantiate exists<lt I, lt K> { I <= K }
//! relate K <= static
//! extract (&I i32)
//! expect exists<lt I, lt K> { I <= K, K <= static } => (&I i32)
//! ```

pub mod parser;
pub mod runner;

#[cfg(test)]
mod tests;

pub use parser::{parse_derivation, parse_scheme, ParseError};
pub use runner::{run_derivation, Extraction, RunError, RunErrorKind, RunReport};

use crate::scheme::QuantifiedScheme;
use crate::types::{RelationOp, Term, Variable};

/// A parsed script
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Derivation {
    pub steps: Vec<Step>,
}

impl Derivation {
    /// Number of `extract` steps
    pub fn extraction_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step.command, Command::Extract(_)))
            .count()
    }
}

/// One non-empty, non-comment line
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    /// 1-indexed source line
    pub line: usize,
    /// 1-indexed column of the command keyword
    pub column: usize,
    pub command: Command,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Instantiate(QuantifiedScheme),
    Bind { var: Variable, value: Term },
    Relate { left: Variable, op: RelationOp, right: Term },
    Extract(Vec<Term>),
    Expect(QuantifiedScheme),
}

impl Command {
    pub fn keyword(&self) -> &str {
        match self {
            Command::Instantiate(_) => "instantiate",
            Command::Bind { .. } => "bind",
            Command::Relate { .. } => "relate",
            Command::Extract(_) => "extract",
            Command::Expect(_) => "expect",
        }
    }
}
