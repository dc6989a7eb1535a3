use crate::core::Value;
use crate::handler::Handler;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A deferred computation producing a field value on first method-style read.
pub type Compute = Arc<dyn Fn() -> Value + Send + Sync>;

/// Field name to value mapping, as carried by entities and handlers.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A single entity field slot.
///
/// `Concrete` holds a scalar; `Deferred` holds a not-yet-evaluated
/// computation (evaluated at most once via [`Entity::resolve`]); `Related`
/// holds a query handle to a not-yet-materialized related collection, used
/// by expand-lists serialization.
///
/// [`Entity::resolve`]: crate::Entity::resolve
#[derive(Clone)]
pub enum FieldValue {
    Concrete(Value),
    Deferred(Compute),
    Related(Arc<dyn Handler>),
}

impl FieldValue {
    /// Wrap a zero-argument computation as a lazily evaluated field.
    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::Deferred(Arc::new(f))
    }

    /// Wrap a query handle to a related collection.
    pub fn related(handler: Arc<dyn Handler>) -> Self {
        Self::Related(handler)
    }

    pub fn as_concrete(&self) -> Option<&Value> {
        match self {
            Self::Concrete(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    pub fn is_related(&self) -> bool {
        matches!(self, Self::Related(_))
    }
}

/// `Concrete` compares by value; `Deferred` and `Related` compare by
/// identity of the shared computation/handle. An unresolved deferred field is
/// therefore clean against a snapshot holding the same computation, and
/// reassigning a field to a new computation registers as a change.
impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Concrete(a), Self::Concrete(b)) => a == b,
            (Self::Deferred(a), Self::Deferred(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Self::Related(a), Self::Related(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concrete(v) => f.debug_tuple("Concrete").field(v).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
            Self::Related(_) => f.write_str("Related(..)"),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        Self::Concrete(v)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Concrete(Value::Integer(i))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        Self::Concrete(Value::Float(f))
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Concrete(Value::Text(s))
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Concrete(Value::Text(s.to_string()))
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Concrete(Value::Boolean(b))
    }
}
