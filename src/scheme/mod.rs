//! Quantified schemes and the two operations connecting them to environments:
//! instantiation (`Env::instantiate`) and extraction (`Env::extract_scheme`).

mod extract;
mod instantiate;


pub use instantiate::Instantiation;

use crate::env::{Env, EnvError};
use crate::subst::{Subst, Substitution};
use crate::types::{write_comma_separated, Quantifier, Relation, Term, Variable};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// `quantifier<binders> { constraints } body`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantifiedScheme {
    pub quantifier: Quantifier,
    pub binders: Vec<Variable>,
    pub constraints: Vec<Relation>,
    pub body: SchemeBody,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemeBody {
    /// Value terms; empty when only the constraints matter
    Terms(Vec<Term>),
    /// A nested quantifier level, e.g. `forall<..> exists<..> ...`
    Scheme(Box<QuantifiedScheme>),
}

impl QuantifiedScheme {
    pub fn new(
        quantifier: Quantifier,
        binders: Vec<Variable>,
        constraints: Vec<Relation>,
        terms: Vec<Term>,
    ) -> Self {
        Self {
            quantifier,
            binders,
            constraints,
            body: SchemeBody::Terms(terms),
        }
    }

    pub fn for_all(binders: Vec<Variable>) -> Self {
        Self::new(Quantifier::ForAll, binders, vec![], vec![])
    }

    pub fn exists(binders: Vec<Variable>) -> Self {
        Self::new(Quantifier::Exists, binders, vec![], vec![])
    }

    pub fn with_constraints(mut self, constraints: Vec<Relation>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_terms(mut self, terms: Vec<Term>) -> Self {
        self.body = SchemeBody::Terms(terms);
        self
    }

    pub fn with_inner(mut self, inner: QuantifiedScheme) -> Self {
        self.body = SchemeBody::Scheme(Box::new(inner));
        self
    }

    /// Levels from the outermost inwards
    pub fn levels(&self) -> impl Iterator<Item = &QuantifiedScheme> {
        std::iter::successors(Some(self), |level| match &level.body {
            SchemeBody::Scheme(inner) => Some(inner.as_ref()),
            SchemeBody::Terms(_) => None,
        })
    }

    /// Body terms of the innermost level
    pub fn terms(&self) -> &[Term] {
        match &self.body {
            SchemeBody::Terms(terms) => terms,
            SchemeBody::Scheme(inner) => inner.terms(),
        }
    }

    pub fn binder_count(&self) -> usize {
        self.levels().map(|level| level.binders.len()).sum()
    }

    pub fn all_constraints(&self) -> Vec<&Relation> {
        self.levels()
            .flat_map(|level| level.constraints.iter())
            .collect()
    }

    /// Variables not bound by an enclosing level, in first-seen order
    pub fn free_vars(&self) -> IndexSet<Variable> {
        let mut free = IndexSet::new();
        let mut bound: Vec<&Variable> = Vec::new();
        for level in self.levels() {
            bound.extend(level.binders.iter());
            let mut visit = |v: &Variable| {
                if !bound.iter().any(|b| b.name == v.name) && !free.contains(v) {
                    free.insert(v.clone());
                }
            };
            for rel in &level.constraints {
                rel.for_each_var(&mut visit);
            }
            if let SchemeBody::Terms(terms) = &level.body {
                for term in terms {
                    term.for_each_var(&mut visit);
                }
            }
        }
        free
    }

    /// Check the scheme's shape against `env`: binders are unique per level,
    /// every variable is bound by an enclosing level or declared in `env`,
    /// and constraints and body terms are well-kinded.
    pub fn validate(&self, env: &Env) -> Result<(), EnvError> {
        let mut scope: Vec<&Variable> = Vec::new();
        for level in self.levels() {
            let mut names = BTreeSet::new();
            for binder in &level.binders {
                if !names.insert(binder.name.as_str()) {
                    return Err(EnvError::MalformedScheme(format!(
                        "`{}` is bound twice by the same {}",
                        binder, level.quantifier
                    )));
                }
            }
            // Inner binders shadow outer ones with the same name
            scope.retain(|v| !names.contains(v.name.as_str()));
            scope.extend(level.binders.iter());

            // Names resolve the way substitution does, by name; the kind
            // written at the use site must then agree with the binding
            let scope_problem = |v: &Variable| -> Option<String> {
                let bound_kind = scope
                    .iter()
                    .find(|b| b.name == v.name)
                    .map(|b| b.kind)
                    .or_else(|| env.lookup(&v.name).map(|decl| decl.var.kind));
                match bound_kind {
                    None => Some(format!("`{}`, which is not in scope", v)),
                    Some(kind) if kind != v.kind => {
                        Some(format!("`{}` as {}, but it is bound as {}", v, v.kind, kind))
                    }
                    Some(_) => None,
                }
            };

            for rel in &level.constraints {
                let mut problem = None;
                rel.for_each_var(&mut |v| {
                    if problem.is_none() {
                        problem = scope_problem(v);
                    }
                });
                if let Some(problem) = problem {
                    return Err(EnvError::MalformedScheme(format!(
                        "constraint `{}` mentions {}",
                        rel, problem
                    )));
                }
                if rel.right.kind() != rel.left.kind || !rel.right.is_well_kinded() {
                    return Err(EnvError::MalformedScheme(format!(
                        "constraint `{}` relates terms of different kinds",
                        rel
                    )));
                }
            }

            if let SchemeBody::Terms(terms) = &level.body {
                for term in terms {
                    let mut problem = None;
                    term.for_each_var(&mut |v| {
                        if problem.is_none() {
                            problem = scope_problem(v);
                        }
                    });
                    if let Some(problem) = problem {
                        return Err(EnvError::MalformedScheme(format!(
                            "body term `{}` mentions {}",
                            term, problem
                        )));
                    }
                    if let Some((part, expected)) = term.ill_kinded_part() {
                        return Err(EnvError::MalformedScheme(format!(
                            "body term `{}` is ill-kinded: `{}` should be {}",
                            term, part, expected
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Rename every binder, level by level, to a positional name (`^0`,
    /// `^1`, ...). Alpha-equivalent schemes have equal canonical forms.
    pub fn canonicalize(&self) -> Self {
        let mut next = 0;
        self.canonicalize_from(&mut next)
    }

    fn canonicalize_from(&self, next: &mut usize) -> Self {
        let mut renaming = Substitution::new();
        let binders = self
            .binders
            .iter()
            .map(|b| {
                let canonical = Variable::new(format!("^{}", *next), b.kind);
                *next += 1;
                renaming.insert(b, canonical.to_term());
                canonical
            })
            .collect();

        let body = match &self.body {
            SchemeBody::Terms(terms) => SchemeBody::Terms(terms.subst(&renaming)),
            SchemeBody::Scheme(inner) => {
                SchemeBody::Scheme(Box::new(inner.subst(&renaming).canonicalize_from(next)))
            }
        };

        QuantifiedScheme {
            quantifier: self.quantifier,
            binders,
            constraints: self.constraints.subst(&renaming),
            body,
        }
    }

    /// Structural equality up to consistent renaming of binders
    pub fn alpha_eq(&self, other: &QuantifiedScheme) -> bool {
        self.canonicalize() == other.canonicalize()
    }

    fn for_each_name(&self, f: &mut impl FnMut(&str)) {
        for level in self.levels() {
            for binder in &level.binders {
                f(&binder.name);
            }
            for rel in &level.constraints {
                rel.for_each_var(&mut |v| f(&v.name));
            }
            if let SchemeBody::Terms(terms) = &level.body {
                for term in terms {
                    term.for_each_var(&mut |v| f(&v.name));
                }
            }
        }
    }
}

/// Capture-avoiding: mappings for bound names are ignored, and a binder that
/// would capture a variable of a replacement is renamed first.
impl Subst for QuantifiedScheme {
    fn subst(&self, subst: &Substitution) -> Self {
        let bound_names: Vec<&str> = self.binders.iter().map(|b| b.name.as_str()).collect();
        let mut inner = subst.without(bound_names);

        let free = self.free_vars();
        let captured = inner.range_names(free.iter().map(|v| v.name.as_str()));

        let mut avoid: BTreeSet<String> = captured.clone();
        self.for_each_name(&mut |name| {
            avoid.insert(name.to_string());
        });

        let mut binders = Vec::with_capacity(self.binders.len());
        for binder in &self.binders {
            if captured.contains(&binder.name) {
                let mut name = format!("{}'", binder.name);
                while avoid.contains(&name) {
                    name.push('\'');
                }
                avoid.insert(name.clone());
                let renamed = Variable::new(name, binder.kind);
                inner.insert(binder, renamed.to_term());
                binders.push(renamed);
            } else {
                binders.push(binder.clone());
            }
        }

        let body = match &self.body {
            SchemeBody::Terms(terms) => SchemeBody::Terms(terms.subst(&inner)),
            SchemeBody::Scheme(nested) => SchemeBody::Scheme(Box::new(nested.subst(&inner))),
        };

        QuantifiedScheme {
            quantifier: self.quantifier,
            binders,
            constraints: self.constraints.subst(&inner),
            body,
        }
    }
}

impl fmt::Display for QuantifiedScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<", self.quantifier)?;
        for (i, binder) in self.binders.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", binder.kind, binder)?;
        }
        f.write_str(">")?;
        if !self.constraints.is_empty() {
            f.write_str(" { ")?;
            write_comma_separated(f, &self.constraints)?;
            f.write_str(" }")?;
        }
        match &self.body {
            SchemeBody::Terms(terms) => {
                f.write_str(" => (")?;
                write_comma_separated(f, terms)?;
                f.write_str(")")
            }
            SchemeBody::Scheme(inner) => write!(f, " {}", inner),
        }
    }
}
