//! Substitution of variables by terms
//!
//! Substitutions are keyed by variable name: names are unique within an
//! environment, so the replacement carries the authoritative kind.

use crate::types::{Relation, Term, Variable};
use indexmap::IndexSet;
use std::collections::{BTreeMap, BTreeSet};

/// Simultaneous mapping from variable names to replacement terms
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Substitution {
    map: BTreeMap<String, Term>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `var` to `term`, replacing any previous mapping for the same name
    pub fn insert(&mut self, var: &Variable, term: Term) {
        self.map.insert(var.name.clone(), term);
    }

    pub fn get(&self, name: &str) -> Option<&Term> {
        self.map.get(name)
    }

    /// The variable `var` is renamed to, if it is mapped to a variable.
    /// `None` when it is unmapped or mapped to any other term.
    pub fn renaming_of(&self, var: &Variable) -> Option<&Variable> {
        match self.map.get(&var.name) {
            Some(Term::Var(renamed)) => Some(renamed),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Term)> {
        self.map.iter()
    }

    /// Copy of this substitution without mappings for the given names
    pub fn without<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut map = self.map.clone();
        for name in names {
            map.remove(name);
        }
        Self { map }
    }

    /// Names of the variables occurring in the replacements of `keys`
    pub fn range_names<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for key in keys {
            if let Some(term) = self.map.get(key) {
                term.for_each_var(&mut |v| {
                    names.insert(v.name.clone());
                });
            }
        }
        names
    }
}

impl FromIterator<(Variable, Term)> for Substitution {
    fn from_iter<I: IntoIterator<Item = (Variable, Term)>>(iter: I) -> Self {
        let mut subst = Substitution::new();
        for (var, term) in iter {
            subst.insert(&var, term);
        }
        subst
    }
}

/// Apply a substitution, returning the rewritten value.
///
/// Positions that hold a term are replaced by the mapped term. Positions that
/// can only hold a variable, such as a bare `Variable` or the left operand of
/// a `Relation`, are renaming-only: they follow a variable-to-variable
/// mapping and stay unchanged under a mapping to any other term. Callers that
/// need to see such a mapping use `Substitution::renaming_of` or
/// `Substitution::get` directly.
pub trait Subst: Sized {
    fn subst(&self, subst: &Substitution) -> Self;
}

impl Subst for Term {
    fn subst(&self, subst: &Substitution) -> Self {
        if subst.is_empty() {
            return self.clone();
        }
        self.map_vars(&mut |v| subst.get(&v.name).cloned().unwrap_or_else(|| v.to_term()))
    }
}

/// Renaming-only: a mapping to a non-variable term leaves the variable in place
impl Subst for Variable {
    fn subst(&self, subst: &Substitution) -> Self {
        subst.renaming_of(self).cloned().unwrap_or_else(|| self.clone())
    }
}

impl Subst for Relation {
    fn subst(&self, subst: &Substitution) -> Self {
        Relation {
            left: self.left.subst(subst),
            op: self.op,
            right: self.right.subst(subst),
        }
    }
}

impl<T: Subst> Subst for Vec<T> {
    fn subst(&self, subst: &Substitution) -> Self {
        self.iter().map(|t| t.subst(subst)).collect()
    }
}

/// Free variables of `terms` in first-seen order (left-to-right, depth-first)
pub fn free_vars<'a>(terms: impl IntoIterator<Item = &'a Term>) -> IndexSet<Variable> {
    let mut vars = IndexSet::new();
    for term in terms {
        term.for_each_var(&mut |v| {
            if !vars.contains(v) {
                vars.insert(v.clone());
            }
        });
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Kind, RelationOp};

    #[test]
    fn test_subst_term() {
        let a = Variable::ty("A");
        let i = Variable::lt("I");
        let subst: Substitution = [(a.clone(), Term::reference(i.to_term(), Term::i32()))]
            .into_iter()
            .collect();

        let term = Term::adt("Vec", vec![a.to_term()]);
        assert_eq!(term.subst(&subst).to_string(), "Vec<&I i32>");
    }

    #[test]
    fn test_subst_is_simultaneous() {
        let x = Variable::ty("X");
        let y = Variable::ty("Y");
        let mut subst = Substitution::new();
        subst.insert(&x, y.to_term());
        subst.insert(&y, x.to_term());

        let term = Term::Tuple(vec![x.to_term(), y.to_term()]);
        assert_eq!(term.subst(&subst).to_string(), "(Y, X)");
    }

    #[test]
    fn test_subst_relation_renames_left() {
        let i = Variable::lt("I");
        let k = Variable::lt("K");
        let mut subst = Substitution::new();
        subst.insert(&i, Variable::lt("I_1").to_term());
        subst.insert(&k, Term::Static);

        let rel = Relation::le(&i, k.clone()).subst(&subst);
        assert_eq!(rel.left.name, "I_1");
        assert_eq!(rel.op, RelationOp::LessEq);
        assert_eq!(rel.right, Term::Static);

        // Non-variable replacement of the left operand keeps it
        let rel = Relation::le(&k, i.clone()).subst(&subst);
        assert_eq!(rel.left, k);
    }

    #[test]
    fn test_variable_subst_is_renaming_only() {
        let a = Variable::lt("a");
        let b = Variable::lt("b");
        let mut subst = Substitution::new();
        subst.insert(&a, Variable::lt("a_0").to_term());
        subst.insert(&b, Term::Static);

        assert_eq!(subst.renaming_of(&a), Some(&Variable::lt("a_0")));
        assert_eq!(a.subst(&subst), Variable::lt("a_0"));

        // The mapping to `'static` is not hidden: it is visible through `get`
        // and the variable itself is not rewritten
        assert_eq!(subst.renaming_of(&b), None);
        assert_eq!(subst.get("b"), Some(&Term::Static));
        assert_eq!(b.subst(&subst), b);
        assert_eq!(b.to_term().subst(&subst), Term::Static);

        assert_eq!(subst.renaming_of(&Variable::lt("c")), None);
    }

    #[test]
    fn test_free_vars_first_seen() {
        let i = Variable::lt("I");
        let j = Variable::lt("J");
        let terms = vec![
            Term::reference(i.to_term(), Term::i32()),
            Term::reference(j.to_term(), Term::i32()),
            Term::reference(i.to_term(), Term::i32()),
        ];
        let vars: Vec<_> = free_vars(&terms).into_iter().collect();
        assert_eq!(vars, vec![i, j]);
    }

    #[test]
    fn test_without_and_range_names() {
        let a = Variable::ty("A");
        let b = Variable::ty("B");
        let mut subst = Substitution::new();
        subst.insert(&a, Term::Var(Variable::new("Z", Kind::Ty)));
        subst.insert(&b, Term::i32());

        assert_eq!(subst.without(["A"]).len(), 1);
        let names = subst.range_names(["A", "B"]);
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["Z".to_string()]);
    }
}
