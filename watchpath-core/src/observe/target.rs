//! Observable targets and their identities.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use serde::Serialize;

use super::list::{ListInner, ObservableList};
use super::object::{ObjectInner, ObservableObject};
use super::path::PropertyPath;
use super::value::Value;

/// Unique identifier for an observable target.
///
/// Every object and list gets one when it is created. The registry keys
/// descriptors by this identity instead of holding the target itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target-{}", self.0)
    }
}

/// Anything listeners can be attached to.
#[derive(Clone)]
pub enum Target {
    Object(ObservableObject),
    List(ObservableList),
}

impl Target {
    pub fn id(&self) -> TargetId {
        match self {
            Target::Object(object) => object.id(),
            Target::List(list) => list.id(),
        }
    }

    /// The declared identifier used to resolve named listener handlers.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Target::Object(object) => object.identifier(),
            Target::List(list) => list.identifier(),
        }
    }

    /// Read a single property. Lists answer numeric indices and `length`.
    pub fn property(&self, name: &str) -> Value {
        match self {
            Target::Object(object) => object.get(name),
            Target::List(list) => list.property(name),
        }
    }

    /// Resolve a (possibly dotted) path against the current values.
    pub fn resolve(&self, path: &PropertyPath) -> Value {
        if path.is_wildcard() {
            return Value::from(self.clone());
        }
        let mut segments = path.segments().peekable();
        let mut current = self.clone();
        while let Some(segment) = segments.next() {
            let value = current.property(segment);
            if segments.peek().is_none() {
                return value;
            }
            match value.as_target() {
                Some(next) => current = next,
                None => return Value::Undefined,
            }
        }
        Value::Undefined
    }

    pub(crate) fn downgrade(&self) -> WeakTarget {
        match self {
            Target::Object(object) => WeakTarget::Object(object.downgrade()),
            Target::List(list) => WeakTarget::List(list.downgrade()),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Object(object) => write!(f, "{object:?}"),
            Target::List(list) => write!(f, "{list:?}"),
        }
    }
}

impl From<ObservableObject> for Target {
    fn from(object: ObservableObject) -> Self {
        Target::Object(object)
    }
}

impl From<ObservableList> for Target {
    fn from(list: ObservableList) -> Self {
        Target::List(list)
    }
}

/// A non-owning reference to a target.
#[derive(Clone)]
pub(crate) enum WeakTarget {
    Object(Weak<ObjectInner>),
    List(Weak<ListInner>),
}

impl WeakTarget {
    pub fn upgrade(&self) -> Option<Target> {
        match self {
            WeakTarget::Object(weak) => weak.upgrade().map(|inner| Target::Object(ObservableObject::from_inner(inner))),
            WeakTarget::List(weak) => weak.upgrade().map(|inner| Target::List(ObservableList::from_inner(inner))),
        }
    }
}

/// Types that can be passed to the registration API.
pub trait Observable {
    /// The target listeners attach to.
    fn as_target(&self) -> Target;
}

impl Observable for Target {
    fn as_target(&self) -> Target {
        self.clone()
    }
}

impl Observable for ObservableObject {
    fn as_target(&self) -> Target {
        Target::Object(self.clone())
    }
}

impl Observable for ObservableList {
    fn as_target(&self) -> Target {
        Target::List(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Observer;

    #[test]
    fn target_ids_are_unique() {
        let id1 = TargetId::new();
        let id2 = TargetId::new();
        assert_ne!(id1, id2);
        assert!(id1 < id2);
    }

    #[test]
    fn resolve_walks_objects_and_lists() {
        let observer = Observer::new();
        let root = observer.object();
        let item = observer.object();
        item.set("name", "first");
        root.set("items", observer.list([Value::from(item)]));

        let target = root.as_target();
        assert_eq!(target.resolve(&PropertyPath::parse("items.0.name").unwrap()), Value::from("first"));
        assert_eq!(target.resolve(&PropertyPath::parse("items.length").unwrap()), Value::from(1));
        assert_eq!(target.resolve(&PropertyPath::parse("items.5.name").unwrap()), Value::Undefined);
    }

    #[test]
    fn weak_targets_do_not_keep_targets_alive() {
        let observer = Observer::new();
        let object = observer.object();
        let weak = object.as_target().downgrade();
        assert!(weak.upgrade().is_some());

        drop(object);
        assert!(weak.upgrade().is_none());
    }
}
