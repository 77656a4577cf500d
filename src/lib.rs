//! Scheme-Env - Quantified environments for a type/lifetime system
//!
//! This crate provides the environment engine: instantiating quantified
//! schemes with fresh variables, recording bindings and inequality
//! relations, and extracting a scheme back out of an environment.

pub mod types;
pub mod subst;
pub mod graph;
pub mod env;
pub mod scheme;
pub mod derivation;
pub mod cache;
pub mod diagnostics;
pub mod checker;

pub use env::{Env, EnvError, NameGenerator};
pub use scheme::{QuantifiedScheme, SchemeBody};
pub use types::{Kind, Quantifier, Relation, RelationOp, Term, Variable};
