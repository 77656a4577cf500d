//! Term grammar: kinds, variables, terms and relations

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a variable or term
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Kind {
    /// Types: i32, &'a T, Vec<T>, ...
    Ty,
    /// Lifetimes: 'a, 'static
    Lt,
}

impl Kind {
    pub fn as_str(&self) -> &str {
        match self {
            Kind::Ty => "ty",
            Kind::Lt => "lt",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A kinded variable. Two variables are equal when name and kind agree.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub kind: Kind,
}

impl Variable {
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn ty(name: impl Into<String>) -> Self {
        Self::new(name, Kind::Ty)
    }

    pub fn lt(name: impl Into<String>) -> Self {
        Self::new(name, Kind::Lt)
    }

    /// Shorthand for `Term::Var(self.clone())`
    pub fn to_term(&self) -> Term {
        Term::Var(self.clone())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Scalar types
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scalar {
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    Bool,
    Char,
    Str,
}

impl Scalar {
    pub const ALL: [Scalar; 15] = [
        Scalar::I8,
        Scalar::I16,
        Scalar::I32,
        Scalar::I64,
        Scalar::I128,
        Scalar::Isize,
        Scalar::U8,
        Scalar::U16,
        Scalar::U32,
        Scalar::U64,
        Scalar::U128,
        Scalar::Usize,
        Scalar::Bool,
        Scalar::Char,
        Scalar::Str,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scalar::I8 => "i8",
            Scalar::I16 => "i16",
            Scalar::I32 => "i32",
            Scalar::I64 => "i64",
            Scalar::I128 => "i128",
            Scalar::Isize => "isize",
            Scalar::U8 => "u8",
            Scalar::U16 => "u16",
            Scalar::U32 => "u32",
            Scalar::U64 => "u64",
            Scalar::U128 => "u128",
            Scalar::Usize => "usize",
            Scalar::Bool => "bool",
            Scalar::Char => "char",
            Scalar::Str => "str",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == name)
    }
}

/// Value terms of the type/lifetime grammar
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    /// Reference to a declared (or bound) variable
    Var(Variable),
    /// Scalar type: i32, bool, ...
    Scalar(Scalar),
    /// Reference type: &'lifetime referent
    Ref {
        lifetime: Box<Term>,
        referent: Box<Term>,
    },
    /// The 'static lifetime
    Static,
    /// Named type with parameters: Vec<T>, HashMap<K, V>
    Adt { name: String, params: Vec<Term> },
    /// Tuple type
    Tuple(Vec<Term>),
}

impl Term {
    pub fn var(var: &Variable) -> Self {
        Term::Var(var.clone())
    }

    pub fn scalar(scalar: Scalar) -> Self {
        Term::Scalar(scalar)
    }

    pub fn i32() -> Self {
        Term::Scalar(Scalar::I32)
    }

    /// `&lifetime referent`
    pub fn reference(lifetime: Term, referent: Term) -> Self {
        Term::Ref {
            lifetime: Box::new(lifetime),
            referent: Box::new(referent),
        }
    }

    pub fn adt(name: impl Into<String>, params: Vec<Term>) -> Self {
        Term::Adt {
            name: name.into(),
            params,
        }
    }

    /// Kind of this term, assuming it is well-kinded
    pub fn kind(&self) -> Kind {
        match self {
            Term::Var(v) => v.kind,
            Term::Static => Kind::Lt,
            Term::Scalar(_) | Term::Ref { .. } | Term::Adt { .. } | Term::Tuple(_) => Kind::Ty,
        }
    }

    /// Returns the first sub-term whose kind does not fit its position
    pub fn ill_kinded_part(&self) -> Option<(&Term, Kind)> {
        match self {
            Term::Var(_) | Term::Scalar(_) | Term::Static => None,
            Term::Ref { lifetime, referent } => {
                if lifetime.kind() != Kind::Lt {
                    return Some((lifetime, Kind::Lt));
                }
                if referent.kind() != Kind::Ty {
                    return Some((referent, Kind::Ty));
                }
                lifetime
                    .ill_kinded_part()
                    .or_else(|| referent.ill_kinded_part())
            }
            Term::Adt { params, .. } => params.iter().find_map(|p| p.ill_kinded_part()),
            Term::Tuple(elems) => elems.iter().find_map(|e| {
                if e.kind() != Kind::Ty {
                    Some((e, Kind::Ty))
                } else {
                    e.ill_kinded_part()
                }
            }),
        }
    }

    pub fn is_well_kinded(&self) -> bool {
        self.ill_kinded_part().is_none()
    }

    /// Visit every variable occurrence, left-to-right, depth-first
    pub fn for_each_var(&self, f: &mut impl FnMut(&Variable)) {
        match self {
            Term::Var(v) => f(v),
            Term::Scalar(_) | Term::Static => {}
            Term::Ref { lifetime, referent } => {
                lifetime.for_each_var(f);
                referent.for_each_var(f);
            }
            Term::Adt { params: terms, .. } | Term::Tuple(terms) => {
                for t in terms {
                    t.for_each_var(f);
                }
            }
        }
    }

    /// Rebuild the term, replacing each variable occurrence by `f(var)`
    pub fn map_vars(&self, f: &mut impl FnMut(&Variable) -> Term) -> Term {
        match self {
            Term::Var(v) => f(v),
            Term::Scalar(_) | Term::Static => self.clone(),
            Term::Ref { lifetime, referent } => {
                Term::reference(lifetime.map_vars(f), referent.map_vars(f))
            }
            Term::Adt { name, params } => Term::Adt {
                name: name.clone(),
                params: params.iter().map(|p| p.map_vars(f)).collect(),
            },
            Term::Tuple(elems) => Term::Tuple(elems.iter().map(|e| e.map_vars(f)).collect()),
        }
    }

    pub fn mentions(&self, var: &Variable) -> bool {
        let mut found = false;
        self.for_each_var(&mut |v| found |= v == var);
        found
    }
}

impl From<Variable> for Term {
    fn from(var: Variable) -> Self {
        Term::Var(var)
    }
}

impl From<Scalar> for Term {
    fn from(scalar: Scalar) -> Self {
        Term::Scalar(scalar)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(v) => write!(f, "{}", v),
            Term::Scalar(s) => f.write_str(s.as_str()),
            Term::Ref { lifetime, referent } => write!(f, "&{} {}", lifetime, referent),
            Term::Static => f.write_str("static"),
            Term::Adt { name, params } => {
                write!(f, "{}<", name)?;
                write_comma_separated(f, params)?;
                f.write_str(">")
            }
            Term::Tuple(elems) => {
                f.write_str("(")?;
                write_comma_separated(f, elems)?;
                f.write_str(")")
            }
        }
    }
}

pub(crate) fn write_comma_separated<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Universal (caller-chosen) or existential (callee-chosen) binder
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quantifier {
    ForAll,
    Exists,
}

impl Quantifier {
    pub fn as_str(&self) -> &str {
        match self {
            Quantifier::ForAll => "forall",
            Quantifier::Exists => "exists",
        }
    }
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relation symbol between a variable and a term
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationOp {
    /// `a <= b`
    LessEq,
    /// `a >= b`
    GreaterEq,
}

impl RelationOp {
    pub fn as_str(&self) -> &str {
        match self {
            RelationOp::LessEq => "<=",
            RelationOp::GreaterEq => ">=",
        }
    }
}

impl fmt::Display for RelationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directional inequality `left op right`
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub left: Variable,
    pub op: RelationOp,
    pub right: Term,
}

impl Relation {
    pub fn new(left: Variable, op: RelationOp, right: Term) -> Self {
        Self { left, op, right }
    }

    /// `left <= right`
    pub fn le(left: &Variable, right: impl Into<Term>) -> Self {
        Self::new(left.clone(), RelationOp::LessEq, right.into())
    }

    /// `left >= right`
    pub fn ge(left: &Variable, right: impl Into<Term>) -> Self {
        Self::new(left.clone(), RelationOp::GreaterEq, right.into())
    }

    /// Visit the left operand, then the variables of the right operand
    pub fn for_each_var(&self, f: &mut impl FnMut(&Variable)) {
        f(&self.left);
        self.right.for_each_var(f);
    }

    pub fn mentions(&self, var: &Variable) -> bool {
        self.left == *var || self.right.mentions(var)
    }

    /// `(lower, upper)` when both operands are variables
    pub fn var_edge(&self) -> Option<(&Variable, &Variable)> {
        let Term::Var(right) = &self.right else {
            return None;
        };
        match self.op {
            RelationOp::LessEq => Some((&self.left, right)),
            RelationOp::GreaterEq => Some((right, &self.left)),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.op, self.right)
    }
}
