//! Fresh variable names

use crate::types::Variable;
use std::collections::HashSet;

/// Generator of fresh variable names.
///
/// Passed explicitly to the instantiator so that fresh names are
/// reproducible: the same generator state and the same environment always
/// yield the same names.
#[derive(Debug, Clone, Default)]
pub struct NameGenerator {
    next_suffix: usize,
    issued: HashSet<String>,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce a variable of `base`'s kind whose name was never issued by
    /// this generator and is not `taken`. The base name itself is preferred.
    pub fn fresh(&mut self, base: &Variable, taken: impl Fn(&str) -> bool) -> Variable {
        let mut candidate = base.name.clone();
        while taken(&candidate) || self.issued.contains(&candidate) {
            candidate = format!("{}_{}", base.name, self.next_suffix);
            self.next_suffix += 1;
        }
        self.issued.insert(candidate.clone());
        Variable::new(candidate, base.kind)
    }

    /// Number of names issued so far
    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }

    pub fn was_issued(&self, name: &str) -> bool {
        self.issued.contains(name)
    }
}
