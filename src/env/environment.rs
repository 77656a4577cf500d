//! Environment: variable declarations plus accumulated facts
//!
//! An `Env` is a persistent value. Every extension returns a new `Env`;
//! the storage is shared between handles and copied on write, so a caller
//! may keep an older handle around to try an alternative derivation.

use crate::env::error::EnvError;
use crate::subst::free_vars;
use crate::types::{Quantifier, Relation, RelationOp, Term, Variable};
use std::fmt;
use std::sync::Arc;

/// A declared variable and the quantifier it was instantiated from
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VarDecl {
    pub var: Variable,
    pub origin: Quantifier,
}

/// Knowledge recorded about variables
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Fact {
    /// The variable stands exactly for `value`
    Binding { var: Variable, value: Term },
    /// Inequality between a variable and a term
    Relation(Relation),
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fact::Binding { var, value } => write!(f, "{} = {}", var, value),
            Fact::Relation(rel) => write!(f, "{}", rel),
        }
    }
}

/// What the environment knows about a declared variable
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VarStatus<'a> {
    Bound(&'a Term),
    /// Unbound, mentioned by at least one relation
    Constrained,
    Free,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Env {
    decls: Arc<Vec<VarDecl>>,
    facts: Arc<Vec<Fact>>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Queries =====

    /// Declarations in the order they were introduced
    pub fn variables(&self) -> &[VarDecl] {
        &self.decls
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.facts.iter().filter_map(|fact| match fact {
            Fact::Relation(rel) => Some(rel),
            Fact::Binding { .. } => None,
        })
    }

    pub fn lookup(&self, name: &str) -> Option<&VarDecl> {
        self.decls.iter().find(|decl| decl.var.name == name)
    }

    pub fn declares_name(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn is_declared(&self, var: &Variable) -> bool {
        self.lookup(&var.name).is_some_and(|decl| decl.var == *var)
    }

    pub fn binding(&self, var: &Variable) -> Option<&Term> {
        self.facts.iter().find_map(|fact| match fact {
            Fact::Binding { var: bound, value } if bound == var => Some(value),
            _ => None,
        })
    }

    pub fn is_bound(&self, var: &Variable) -> bool {
        self.binding(var).is_some()
    }

    pub fn status(&self, var: &Variable) -> Result<VarStatus<'_>, EnvError> {
        self.check_declared(var)?;
        if let Some(value) = self.binding(var) {
            return Ok(VarStatus::Bound(value));
        }
        if self.relations().any(|rel| rel.mentions(var)) {
            Ok(VarStatus::Constrained)
        } else {
            Ok(VarStatus::Free)
        }
    }

    /// Replace bound variables by their values, recursively
    pub fn resolve(&self, term: &Term) -> Term {
        term.map_vars(&mut |v| match self.binding(v) {
            Some(value) => self.resolve(value),
            None => v.to_term(),
        })
    }

    pub(crate) fn check_declared(&self, var: &Variable) -> Result<&VarDecl, EnvError> {
        let decl = self
            .lookup(&var.name)
            .ok_or_else(|| EnvError::UnknownVariable(var.clone()))?;
        if decl.var.kind != var.kind {
            return Err(EnvError::kind_mismatch(&var.to_term(), decl.var.kind));
        }
        Ok(decl)
    }

    /// Every variable of `term` is declared and the term is well-kinded
    pub(crate) fn check_term(&self, term: &Term) -> Result<(), EnvError> {
        for var in free_vars([term]) {
            self.check_declared(&var)?;
        }
        match term.ill_kinded_part() {
            Some((part, expected)) => Err(EnvError::kind_mismatch(part, expected)),
            None => Ok(()),
        }
    }

    // ===== Mutators =====

    /// Record that `var` stands for `value`
    pub fn bind(&self, var: &Variable, value: Term) -> Result<Env, EnvError> {
        let _span = tracing::debug_span!("bind", %var, %value).entered();

        self.check_declared(var)?;
        if let Some(existing) = self.binding(var) {
            return Err(EnvError::DoubleBinding {
                var: var.clone(),
                existing: existing.clone(),
            });
        }
        self.check_term(&value)?;
        if value.kind() != var.kind {
            return Err(EnvError::kind_mismatch(&value, var.kind));
        }
        if self.resolve(&value).mentions(var) {
            return Err(EnvError::CyclicBinding {
                var: var.clone(),
                value,
            });
        }

        let mut env = self.clone();
        env.push_fact(Fact::Binding {
            var: var.clone(),
            value,
        });
        tracing::debug!(facts = env.facts.len(), "binding recorded");
        Ok(env)
    }

    /// Record `left op right`. Relations are not checked for consistency.
    pub fn relate(&self, left: &Variable, op: RelationOp, right: Term) -> Result<Env, EnvError> {
        let _span = tracing::debug_span!("relate", %left, %op, %right).entered();

        self.check_declared(left)?;
        self.check_term(&right)?;
        if right.kind() != left.kind {
            return Err(EnvError::kind_mismatch(&right, left.kind));
        }

        let mut env = self.clone();
        env.push_fact(Fact::Relation(Relation::new(left.clone(), op, right)));
        tracing::debug!(facts = env.facts.len(), "relation recorded");
        Ok(env)
    }

    pub(crate) fn push_decl(&mut self, var: Variable, origin: Quantifier) {
        Arc::make_mut(&mut self.decls).push(VarDecl { var, origin });
    }

    /// Facts form a set: an identical fact is recorded once
    pub(crate) fn push_fact(&mut self, fact: Fact) {
        if !self.facts.contains(&fact) {
            Arc::make_mut(&mut self.facts).push(fact);
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, decl) in self.decls.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {} {}", decl.origin, decl.var.kind, decl.var)?;
        }
        for fact in self.facts.iter() {
            write!(f, "\n{}", fact)?;
        }
        Ok(())
    }
}
