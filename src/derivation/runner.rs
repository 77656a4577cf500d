//! Runs a parsed derivation against a fresh environment

use super::{Command, Derivation, Step};
use crate::env::{Env, EnvError, NameGenerator};
use crate::scheme::QuantifiedScheme;
use crate::subst::{Subst, Substitution};
use crate::types::{Term, Variable};
use std::collections::HashMap;
use thiserror::Error;

/// A scheme produced by an `extract` step
#[derive(Clone, Debug, PartialEq)]
pub struct Extraction {
    pub line: usize,
    pub scheme: QuantifiedScheme,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunErrorKind {
    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("expected `{expected}`, extracted `{found}`")]
    ExpectationMismatch {
        expected: QuantifiedScheme,
        found: QuantifiedScheme,
    },

    #[error("`expect` before any `extract`")]
    NothingExtracted,
}

impl RunErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            RunErrorKind::Env(err) => err.code(),
            RunErrorKind::ExpectationMismatch { .. } => "E101",
            RunErrorKind::NothingExtracted => "E102",
        }
    }
}

/// A failed step
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{line}:{column}: {kind}")]
pub struct RunError {
    pub line: usize,
    pub column: usize,
    pub kind: RunErrorKind,
}

/// Outcome of running a derivation
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Environment after the last successful step
    pub env: Env,
    pub extractions: Vec<Extraction>,
    pub errors: Vec<RunError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn schemes(&self) -> impl Iterator<Item = &QuantifiedScheme> {
        self.extractions.iter().map(|e| &e.scheme)
    }
}

/// Run every step in order. An environment error stops the run; a failed
/// `expect` is recorded and the run continues.
pub fn run_derivation(derivation: &Derivation) -> RunReport {
    let mut runner = Runner::new();
    let mut report = RunReport::default();

    for step in &derivation.steps {
        let _span = tracing::debug_span!("step", line = step.line, command = step.command.keyword())
            .entered();

        match runner.step(step, &mut report.extractions) {
            Ok(()) => {}
            Err(kind) => {
                let stop = matches!(kind, RunErrorKind::Env(_));
                tracing::debug!(error = %kind, "step failed");
                report.errors.push(RunError {
                    line: step.line,
                    column: step.column,
                    kind,
                });
                if stop {
                    break;
                }
            }
        }
    }

    report.env = runner.env;
    report
}

struct Runner {
    env: Env,
    names: NameGenerator,
    /// Script name -> most recent fresh variable instantiated from it
    aliases: HashMap<String, Variable>,
}

impl Runner {
    fn new() -> Self {
        Self {
            env: Env::new(),
            names: NameGenerator::new(),
            aliases: HashMap::new(),
        }
    }

    fn step(&mut self, step: &Step, extractions: &mut Vec<Extraction>) -> Result<(), RunErrorKind> {
        match &step.command {
            Command::Instantiate(scheme) => {
                let scheme = self.resolve_scheme(scheme);
                let inst = self.env.instantiate_with_renaming(&scheme, &mut self.names)?;
                for (binder, fresh) in inst.renaming {
                    self.aliases.insert(binder.name, fresh);
                }
                self.env = inst.env;
            }
            Command::Bind { var, value } => {
                let var = self.resolve_var(var);
                let value = self.resolve_term(value);
                self.env = self.env.bind(&var, value)?;
            }
            Command::Relate { left, op, right } => {
                let left = self.resolve_var(left);
                let right = self.resolve_term(right);
                self.env = self.env.relate(&left, *op, right)?;
            }
            Command::Extract(terms) => {
                let terms: Vec<Term> = terms.iter().map(|t| self.resolve_term(t)).collect();
                let scheme = self.env.extract_scheme(&terms)?;
                extractions.push(Extraction {
                    line: step.line,
                    scheme,
                });
            }
            Command::Expect(expected) => {
                let expected = self.resolve_scheme(expected);
                let found = extractions
                    .last()
                    .map(|e| &e.scheme)
                    .ok_or(RunErrorKind::NothingExtracted)?;
                if !expected.alpha_eq(found) {
                    return Err(RunErrorKind::ExpectationMismatch {
                        expected,
                        found: found.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Script name to environment variable. Unknown names are returned as
    /// written so the engine reports them.
    fn resolve_var(&self, var: &Variable) -> Variable {
        if let Some(fresh) = self.aliases.get(&var.name) {
            return fresh.clone();
        }
        self.env
            .lookup(&var.name)
            .map(|decl| decl.var.clone())
            .unwrap_or_else(|| var.clone())
    }

    fn resolve_term(&self, term: &Term) -> Term {
        term.map_vars(&mut |v| self.resolve_var(v).to_term())
    }

    /// Resolve the free names of a scheme; its binders are left alone
    fn resolve_scheme(&self, scheme: &QuantifiedScheme) -> QuantifiedScheme {
        let subst: Substitution = scheme
            .free_vars()
            .into_iter()
            .map(|v| {
                let resolved = self.resolve_var(&v).to_term();
                (v, resolved)
            })
            .collect();
        if subst.is_empty() {
            scheme.clone()
        } else {
            scheme.subst(&subst)
        }
    }
}
