//! Declarative predicates for content-based branching
//!
//! A route that simulates several backend behaviours on one endpoint lists
//! `(predicate, response)` pairs. Predicates only read the request; query
//! predicates look at decoded query params, body predicates at the parsed
//! JSON body through RFC 6901 pointers.

use crate::request::InterceptedRequest;
use serde_json::Value;

/// Something that accepts or rejects an intercepted request
pub trait RequestPredicate: std::fmt::Debug + Send + Sync {
    /// Evaluate against a request
    fn matches(&self, request: &InterceptedRequest) -> bool;
}

/// Predicate over query params
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPredicate {
    /// Key not present
    Absent(String),
    /// Key present with any value
    Present(String),
    /// Key present with exactly this value
    Equals(String, String),
    /// Every inner predicate holds
    All(Vec<QueryPredicate>),
    /// At least one inner predicate holds
    Any(Vec<QueryPredicate>),
    /// Inner predicate does not hold
    Not(Box<QueryPredicate>),
}

impl QueryPredicate {
    /// `key` not present
    #[inline]
    pub fn absent(key: impl Into<String>) -> Self {
        Self::Absent(key.into())
    }

    /// `key` present
    #[inline]
    pub fn present(key: impl Into<String>) -> Self {
        Self::Present(key.into())
    }

    /// `key == value`
    #[inline]
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals(key.into(), value.into())
    }

    fn eval(&self, request: &InterceptedRequest) -> bool {
        match self {
            Self::Absent(key) => request.query_param(key).is_none(),
            Self::Present(key) => request.query_param(key).is_some(),
            Self::Equals(key, value) => request.query_param(key) == Some(value.as_str()),
            Self::All(inner) => inner.iter().all(|p| p.eval(request)),
            Self::Any(inner) => inner.iter().any(|p| p.eval(request)),
            Self::Not(inner) => !inner.eval(request),
        }
    }
}

impl RequestPredicate for QueryPredicate {
    fn matches(&self, request: &InterceptedRequest) -> bool {
        self.eval(request)
    }
}

/// Predicate over the parsed JSON body
///
/// Against a request without a body every leaf predicate is false, so
/// `Not(leaf)` holds.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyPredicate {
    /// Value at pointer equals `value`
    Equals {
        /// JSON pointer, e.g. `/query/kind`
        pointer: String,
        /// Expected value
        value: Value,
    },
    /// Value at pointer is an array of exactly `len` items
    ArrayLen {
        /// JSON pointer
        pointer: String,
        /// Expected length
        len: usize,
    },
    /// Pointer resolves to any value
    Exists(String),
    /// Every inner predicate holds
    All(Vec<BodyPredicate>),
    /// At least one inner predicate holds
    Any(Vec<BodyPredicate>),
    /// Inner predicate does not hold
    Not(Box<BodyPredicate>),
}

impl BodyPredicate {
    /// Value at `pointer` equals `value`
    #[inline]
    pub fn equals(pointer: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            pointer: pointer.into(),
            value: value.into(),
        }
    }

    /// Array at `pointer` has exactly `len` items
    #[inline]
    pub fn array_len(pointer: impl Into<String>, len: usize) -> Self {
        Self::ArrayLen {
            pointer: pointer.into(),
            len,
        }
    }

    /// `pointer` resolves
    #[inline]
    pub fn exists(pointer: impl Into<String>) -> Self {
        Self::Exists(pointer.into())
    }

    /// Evaluate against an optional body
    #[must_use]
    pub fn eval(&self, body: Option<&Value>) -> bool {
        match self {
            Self::Equals { pointer, value } => {
                body.and_then(|b| b.pointer(pointer)) == Some(value)
            }
            Self::ArrayLen { pointer, len } => body
                .and_then(|b| b.pointer(pointer))
                .and_then(Value::as_array)
                .is_some_and(|items| items.len() == *len),
            Self::Exists(pointer) => body.and_then(|b| b.pointer(pointer)).is_some(),
            Self::All(inner) => inner.iter().all(|p| p.eval(body)),
            Self::Any(inner) => inner.iter().any(|p| p.eval(body)),
            Self::Not(inner) => !inner.eval(body),
        }
    }
}

impl RequestPredicate for BodyPredicate {
    fn matches(&self, request: &InterceptedRequest) -> bool {
        self.eval(request.body())
    }
}
