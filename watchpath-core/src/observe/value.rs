//! Dynamic Values
//!
//! Properties and collection elements hold a [`Value`]. Primitives compare by
//! value; observable objects and lists compare by identity, so replacing an
//! object with a structurally identical but distinct one is a real change.

use std::fmt;
use std::sync::Arc;

use super::list::ObservableList;
use super::object::ObservableObject;
use super::target::Target;

/// A value stored in an observable object or list.
#[derive(Clone, Default)]
pub enum Value {
    /// No value. Reading a missing property yields this.
    #[default]
    Undefined,
    /// An explicit empty value.
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    /// An immutable plain sequence. Mutation notifications carry the removed
    /// and inserted elements of a splice as arrays.
    Array(Arc<[Value]>),
    Object(ObservableObject),
    List(ObservableList),
}

impl Value {
    /// Build a plain array value.
    pub fn array<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Array(values.into_iter().map(Into::into).collect())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `Undefined` or `Null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObservableObject> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ObservableList> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// The observable target this value refers to, if any.
    pub fn as_target(&self) -> Option<Target> {
        match self {
            Value::Object(object) => Some(Target::Object(object.clone())),
            Value::List(list) => Some(Target::List(list.clone())),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.id() == b.id(),
            (Value::List(a), Value::List(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(values) => f.debug_list().entries(values.iter()).finish(),
            Value::Object(object) => write!(f, "{object:?}"),
            Value::List(list) => write!(f, "{list:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::Array(values.into())
    }
}

impl From<ObservableObject> for Value {
    fn from(object: ObservableObject) -> Self {
        Value::Object(object)
    }
}

impl From<ObservableList> for Value {
    fn from(list: ObservableList) -> Self {
        Value::List(list)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        match target {
            Target::Object(object) => Value::Object(object),
            Target::List(list) => Value::List(list),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Observer;

    #[test]
    fn primitives_compare_by_value() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_eq!(Value::from("a"), Value::from(String::from("a")));
        assert_ne!(Value::from(1), Value::from("1"));
        assert_ne!(Value::Undefined, Value::Null);
        assert_eq!(Value::array([1, 2]), Value::array([1, 2]));
    }

    #[test]
    fn nan_is_never_equal() {
        assert_ne!(Value::from(f64::NAN), Value::from(f64::NAN));
    }

    #[test]
    fn targets_compare_by_identity() {
        let observer = Observer::new();
        let a = observer.object();
        let b = observer.object();

        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn options_map_to_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(2)), Value::from(2));
    }

    #[test]
    fn as_target_only_for_observables() {
        let observer = Observer::new();
        let list = observer.list([1, 2]);
        assert!(Value::from(list.clone()).as_target().is_some());
        assert!(Value::from(3).as_target().is_none());
        assert_eq!(Value::from(list).as_list().map(|l| l.len()), Some(2));
    }
}
