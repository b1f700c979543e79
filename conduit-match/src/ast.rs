use conduit_message::{NumericHeader, StringHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    String(String),
    Number(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    String(StringHeader),
    Numeric(NumericHeader),
}

/// A compiled match expression: a binary tree of boolean combinators over
/// field comparisons. Compilation is pure — evaluating the same tree
/// against the same message always yields the same result, and a compiled
/// expression carries no shared mutable state, so it is `Send + Sync` and
/// freely reusable across supervisors.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    True,
    False,
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare { field: Field, op: CompareOp, literal: Literal },
}
