// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The value domain operations read and return, and the calling convention ([`Args`]/[`Outcome`])
//! that the executor uses to invoke an operation's underlying function.

use std::collections::BTreeMap;
use std::fmt;

/// A value flowing through the graph. Kept small and self-contained rather than `Box<dyn Any>` so
/// that solutions remain `Debug`-able and the varargs non-string-iterable check in
/// [`Value::iter_elements`] can be implemented without downcasting.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the elements of a non-string iterable, or `None` if this value is not one (a
    /// `Text` counts as a string, not an iterable, per the `varargs` invocation contract).
    pub fn iter_elements(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => write!(f, "{map:?}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

/// The arguments an operation's function is invoked with: positional values (required needs,
/// then vararg/varargs, in declared order) and keyword values (optional and mapped needs).
#[derive(Clone, Debug, Default)]
pub struct Args {
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
}

impl Args {
    pub fn new(positional: Vec<Value>, keyword: BTreeMap<String, Value>) -> Self {
        Args { positional, keyword }
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    pub fn keyword_map(&self) -> &BTreeMap<String, Value> {
        &self.keyword
    }
}

/// What an operation's function returned, prior to being mapped onto its declared `provides`.
#[derive(Clone, Debug)]
pub enum Outcome {
    /// A single value, used when the operation has exactly one non-side-effect provide.
    Single(Value),
    /// A name→value mapping; keys must be a subset of the operation's `provides`.
    Mapping(BTreeMap<String, Value>),
    /// Values zipped positionally against the operation's `provides`.
    Sequence(Vec<Value>),
    /// The operation produced nothing at all (only legal for `reschedule` operations, or for an
    /// operation whose only provides are side-effects).
    NoResult,
}

/// The error type a user function may return. Carries only a message: domain-specific errors are
/// expected to format themselves into this at the call boundary.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{0}")]
pub struct OperationError(pub String);

impl From<&str> for OperationError {
    fn from(s: &str) -> Self {
        OperationError(s.to_string())
    }
}

impl From<String> for OperationError {
    fn from(s: String) -> Self {
        OperationError(s)
    }
}

pub type OperationResult = Result<Outcome, OperationError>;

/// The callable an [`crate::operation::Operation`] wraps. Opaque beyond this signature: the
/// engine never introspects a function's body, only its declared `needs`/`provides`.
pub type OperationFn = dyn Fn(&Args) -> OperationResult + Send + Sync;
