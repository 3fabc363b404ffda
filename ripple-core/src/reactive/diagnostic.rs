//! Non-fatal diagnostics.
//!
//! Policy violations are reported here instead of failing the operation.

use std::fmt;

/// A policy violation that was tolerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A write went through a read-only wrapper and was ignored.
    ReadonlyWrite { key: String },
    /// A delete went through a read-only wrapper and was ignored.
    ReadonlyDelete { key: String },
    /// A render context was asked for a name it does not know.
    UndeclaredProperty { component: String, name: String },
    /// A component emitted an event without a matching handler prop.
    MissingHandler { component: String, event: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ReadonlyWrite { key } => write!(f, "`{key}` is read-only; write ignored"),
            Diagnostic::ReadonlyDelete { key } => write!(f, "`{key}` is read-only; delete ignored"),
            Diagnostic::UndeclaredProperty { component, name } => {
                write!(f, "<{component}> has no state or prop named `{name}`")
            }
            Diagnostic::MissingHandler { component, event } => {
                write!(f, "<{component}> emitted `{event}` but no handler is bound")
            }
        }
    }
}
