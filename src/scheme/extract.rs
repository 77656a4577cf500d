//! Scheme extraction: generalize environment facts over exported terms

use super::QuantifiedScheme;
use crate::env::{Env, EnvError};
use crate::graph::RelationGraph;
use crate::subst::free_vars;
use crate::types::{Quantifier, Relation, Term, Variable};
use indexmap::IndexSet;
use std::collections::HashMap;

impl Env {
    /// Generalize `exported` over the unbound variables it reaches.
    ///
    /// Bound variables are resolved away. The retained variables are those
    /// reachable from the resolved terms, directly or through relations;
    /// they are listed lower-before-upper along the recorded relations and
    /// re-quantified with the quantifier they were instantiated from.
    pub fn extract_scheme(&self, exported: &[Term]) -> Result<QuantifiedScheme, EnvError> {
        let _span = tracing::debug_span!("extract_scheme", exported = exported.len()).entered();

        for term in exported {
            self.check_term(term)?;
        }

        let body: Vec<Term> = exported.iter().map(|term| self.resolve(term)).collect();

        // Relations touching a bound variable are dropped
        let relations: Vec<&Relation> = self
            .relations()
            .filter(|rel| !self.relation_mentions_bound(rel))
            .collect();

        let retained = self.reachable_vars(&body, &relations);
        tracing::trace!(retained = retained.len(), "closure computed");

        let kept: Vec<&Relation> = relations
            .into_iter()
            .filter(|rel| {
                let mut all_retained = true;
                rel.for_each_var(&mut |v| all_retained &= retained.contains(v));
                all_retained
            })
            .collect();

        let mut graph = RelationGraph::new(retained.iter().cloned());
        for rel in &kept {
            if let Some((lower, upper)) = rel.var_edge() {
                graph.add_edge(lower, upper);
            }
        }
        let order = graph.ordered();

        let position: HashMap<&Variable, usize> =
            order.iter().enumerate().map(|(i, var)| (var, i)).collect();
        let mut constraints: Vec<Relation> = kept.into_iter().cloned().collect();
        constraints.sort_by_key(|rel| position.get(&rel.left).copied().unwrap_or(usize::MAX));

        let (universal, existential): (Vec<Variable>, Vec<Variable>) = order
            .into_iter()
            .partition(|var| self.origin_of(var) == Quantifier::ForAll);

        let scheme = match (universal.is_empty(), existential.is_empty()) {
            (false, false) => QuantifiedScheme::for_all(universal).with_inner(
                QuantifiedScheme::exists(existential)
                    .with_constraints(constraints)
                    .with_terms(body),
            ),
            (false, true) => QuantifiedScheme::for_all(universal)
                .with_constraints(constraints)
                .with_terms(body),
            (true, _) => QuantifiedScheme::exists(existential)
                .with_constraints(constraints)
                .with_terms(body),
        };

        tracing::debug!(%scheme, "scheme extracted");
        Ok(scheme)
    }

    /// Free variables of `body`, then everything connected to them through
    /// `relations`, in discovery order
    fn reachable_vars(&self, body: &[Term], relations: &[&Relation]) -> IndexSet<Variable> {
        let mut retained = free_vars(body);
        let mut cursor = 0;
        while let Some(var) = retained.get_index(cursor).cloned() {
            for rel in relations {
                if rel.mentions(&var) {
                    rel.for_each_var(&mut |v| {
                        retained.insert(v.clone());
                    });
                }
            }
            cursor += 1;
        }
        retained
    }

    fn relation_mentions_bound(&self, rel: &Relation) -> bool {
        let mut bound = false;
        rel.for_each_var(&mut |v| bound |= self.is_bound(v));
        bound
    }

    fn origin_of(&self, var: &Variable) -> Quantifier {
        self.lookup(&var.name)
            .map(|decl| decl.origin)
            .unwrap_or(Quantifier::Exists)
    }
}
