//! Quantifier instantiation: open a scheme into an environment

use super::{QuantifiedScheme, SchemeBody};
use crate::env::{Env, EnvError, Fact, NameGenerator};
use crate::subst::{Subst, Substitution};
use crate::types::{Term, Variable};

/// Result of instantiating a scheme
#[derive(Clone, Debug)]
pub struct Instantiation {
    pub env: Env,
    /// Body terms with binders replaced by the fresh variables
    pub terms: Vec<Term>,
    /// `(binder, fresh variable)` pairs in declaration order
    pub renaming: Vec<(Variable, Variable)>,
}

impl Env {
    /// Extend the environment with fresh variables for every binder of
    /// `scheme` and record its constraints. Returns the extended environment
    /// and the instantiated body terms.
    pub fn instantiate(
        &self,
        scheme: &QuantifiedScheme,
        names: &mut NameGenerator,
    ) -> Result<(Env, Vec<Term>), EnvError> {
        let Instantiation { env, terms, .. } = self.instantiate_with_renaming(scheme, names)?;
        Ok((env, terms))
    }

    pub fn instantiate_with_renaming(
        &self,
        scheme: &QuantifiedScheme,
        names: &mut NameGenerator,
    ) -> Result<Instantiation, EnvError> {
        let _span = tracing::debug_span!("instantiate", %scheme).entered();

        // Nothing is generated before the whole scheme is known to be valid
        scheme.validate(self)?;

        let mut env = self.clone();
        let mut subst = Substitution::new();
        let mut renaming = Vec::new();
        let mut level = scheme;

        loop {
            for binder in &level.binders {
                let fresh = names.fresh(binder, |name| env.declares_name(name));
                tracing::trace!(%binder, %fresh, quantifier = %level.quantifier, "fresh variable");
                subst.insert(binder, fresh.to_term());
                env.push_decl(fresh.clone(), level.quantifier);
                renaming.push((binder.clone(), fresh));
            }

            for constraint in &level.constraints {
                env.push_fact(Fact::Relation(constraint.subst(&subst)));
            }

            match &level.body {
                SchemeBody::Terms(terms) => {
                    let terms = terms.subst(&subst);
                    tracing::debug!(
                        declared = renaming.len(),
                        facts = env.facts().len(),
                        "scheme instantiated"
                    );
                    return Ok(Instantiation {
                        env,
                        terms,
                        renaming,
                    });
                }
                SchemeBody::Scheme(inner) => level = &**inner,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::VarStatus;
    use crate::types::{Quantifier, Relation};

    #[test]
    fn test_instantiate_empty_scheme_is_noop() {
        let mut names = NameGenerator::new();
        let (env, _) = Env::new()
            .instantiate(&QuantifiedScheme::for_all(vec![Variable::ty("T")]), &mut names)
            .unwrap();

        let body = vec![Term::i32()];
        let scheme = QuantifiedScheme::exists(vec![]).with_terms(body.clone());
        let (env2, terms) = env.instantiate(&scheme, &mut names).unwrap();

        assert_eq!(env2, env);
        assert_eq!(terms, body);
    }

    #[test]
    fn test_instantiate_declares_fresh_variables() {
        let mut names = NameGenerator::new();
        let i = Variable::lt("I");
        let k = Variable::lt("K");
        let scheme = QuantifiedScheme::exists(vec![i.clone(), k.clone()])
            .with_constraints(vec![Relation::le(&i, k.clone())])
            .with_terms(vec![Term::reference(i.to_term(), Term::i32())]);

        let (env, terms) = Env::new().instantiate(&scheme, &mut names).unwrap();
        let declared: Vec<_> = env.variables().iter().map(|d| d.var.name.as_str()).collect();
        assert_eq!(declared, vec!["I", "K"]);
        assert_eq!(terms[0].to_string(), "&I i32");
        assert_eq!(env.relations().count(), 1);

        // Instantiating again introduces new names and renames constraints
        let inst = env.instantiate_with_renaming(&scheme, &mut names).unwrap();
        let declared: Vec<_> = inst.env.variables().iter().map(|d| d.var.name.as_str()).collect();
        assert_eq!(declared, vec!["I", "K", "I_0", "K_1"]);
        assert_eq!(inst.terms[0].to_string(), "&I_0 i32");
        assert_eq!(inst.renaming[1], (k.clone(), Variable::lt("K_1")));
        let last = inst.env.relations().last().unwrap();
        assert_eq!(last.to_string(), "I_0 <= K_1");
    }

    #[test]
    fn test_instantiate_erases_quantifier_kind() {
        let mut names = NameGenerator::new();
        let t = Variable::ty("T");
        let a = Variable::ty("A");
        let scheme = QuantifiedScheme::for_all(vec![t.clone()])
            .with_inner(QuantifiedScheme::exists(vec![a.clone()]).with_terms(vec![a.to_term()]));

        let (env, terms) = Env::new().instantiate(&scheme, &mut names).unwrap();
        assert_eq!(env.status(&t).unwrap(), VarStatus::Free);
        assert_eq!(env.status(&a).unwrap(), VarStatus::Free);
        assert_eq!(terms, vec![a.to_term()]);

        let origins: Vec<_> = env.variables().iter().map(|d| d.origin).collect();
        assert_eq!(origins, vec![Quantifier::ForAll, Quantifier::Exists]);
    }

    #[test]
    fn test_instantiate_inner_binder_shadows_outer() {
        let mut names = NameGenerator::new();
        let t = Variable::ty("T");
        let scheme = QuantifiedScheme::for_all(vec![t.clone()]).with_inner(
            QuantifiedScheme::exists(vec![t.clone()]).with_terms(vec![t.to_term()]),
        );

        let inst = Env::new().instantiate_with_renaming(&scheme, &mut names).unwrap();
        assert_eq!(inst.renaming[0].1.name, "T");
        assert_eq!(inst.renaming[1].1.name, "T_0");
        assert_eq!(inst.terms, vec![Variable::ty("T_0").to_term()]);
    }

    #[test]
    fn test_malformed_scheme_leaves_env_untouched() {
        let mut names = NameGenerator::new();
        let i = Variable::lt("I");
        let scheme = QuantifiedScheme::exists(vec![i.clone()])
            .with_constraints(vec![Relation::le(&i, Variable::lt("Nope"))]);

        let env = Env::new();
        let err = env.instantiate(&scheme, &mut names).unwrap_err();
        assert!(matches!(err, EnvError::MalformedScheme(_)));
        assert!(env.variables().is_empty());
        assert_eq!(names.issued_count(), 0);
    }

    #[test]
    fn test_binder_does_not_capture_same_named_variable_of_other_kind() {
        let mut names = NameGenerator::new();
        let (env, _) = Env::new()
            .instantiate(&QuantifiedScheme::for_all(vec![Variable::ty("I")]), &mut names)
            .unwrap();

        // `lt I` binder with a body still mentioning the declared `ty I`
        let lt_i = Variable::lt("I");
        let scheme = QuantifiedScheme::exists(vec![lt_i.clone()]).with_terms(vec![
            Term::adt("Vec", vec![Variable::ty("I").to_term()]),
            Term::reference(lt_i.to_term(), Term::i32()),
        ]);

        let issued = names.issued_count();
        let err = env.instantiate(&scheme, &mut names).unwrap_err();
        assert_eq!(
            err,
            EnvError::MalformedScheme(
                "body term `Vec<I>` mentions `I` as ty, but it is bound as lt".to_string()
            )
        );
        assert_eq!(names.issued_count(), issued);

        // A free name used with the wrong kind is rejected the same way
        let scheme = QuantifiedScheme::exists(vec![Variable::lt("J")])
            .with_terms(vec![Term::reference(Variable::lt("I").to_term(), Term::i32())]);
        let err = env.instantiate(&scheme, &mut names).unwrap_err();
        assert!(matches!(err, EnvError::MalformedScheme(ref m) if m.contains("bound as ty")));
    }

    #[test]
    fn test_scheme_may_mention_env_variables() {
        let mut names = NameGenerator::new();
        let (env, _) = Env::new()
            .instantiate(&QuantifiedScheme::for_all(vec![Variable::lt("a")]), &mut names)
            .unwrap();

        let i = Variable::lt("I");
        let scheme = QuantifiedScheme::exists(vec![i.clone()])
            .with_constraints(vec![Relation::ge(&i, Variable::lt("a"))]);
        let (env, _) = env.instantiate(&scheme, &mut names).unwrap();
        assert_eq!(env.relations().next().unwrap().to_string(), "I >= a");
    }
}
