//! Observable Objects
//!
//! An [`ObservableObject`] is a bag of named properties that reports every
//! write to the observer it was created by. It is the explicit replacement for
//! rewriting property accessors at runtime: `set` is the only way to change a
//! property, and it always runs the two-phase protocol when someone listens.
//!
//! # How a Write Works
//!
//! 1. Writing the value a property already holds does nothing.
//!
//! 2. If no descriptor exists for the property, the value is stored and no
//!    notification is produced.
//!
//! 3. If the descriptor is already dispatching (a listener writes back to the
//!    property it is being notified about), the write is dropped.
//!
//! 4. Otherwise will-change listeners run, the value is stored, and change
//!    listeners run with the stored value as `plus`.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use super::path::PropertyPath;
use super::target::{Target, TargetId};
use super::value::Value;
use crate::notify::WillChange;
use crate::observer::Observer;

pub(crate) struct ObjectInner {
    id: TargetId,
    identifier: Option<String>,
    properties: RwLock<IndexMap<String, Value>>,
    observer: Observer,
}

/// A shared handle to an object with observable properties.
///
/// Clones share state.
#[derive(Clone)]
pub struct ObservableObject {
    inner: Arc<ObjectInner>,
}

impl ObservableObject {
    pub(crate) fn new(observer: Observer, identifier: Option<String>) -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                id: TargetId::new(),
                identifier,
                properties: RwLock::new(IndexMap::new()),
                observer,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ObjectInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ObjectInner> {
        Arc::downgrade(&self.inner)
    }

    /// Get the object's unique ID.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// The declared identifier, if any.
    pub fn identifier(&self) -> Option<&str> {
        self.inner.identifier.as_deref()
    }

    /// The observer this object reports to.
    pub fn observer(&self) -> &Observer {
        &self.inner.observer
    }

    /// Read a property. Missing properties read as `Undefined`.
    pub fn get(&self, name: &str) -> Value {
        self.inner
            .properties
            .read()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Resolve a dotted path starting at this object.
    pub fn get_path(&self, path: &str) -> Value {
        match PropertyPath::parse(path) {
            Ok(path) => Target::Object(self.clone()).resolve(&path),
            Err(_) => Value::Undefined,
        }
    }

    /// Whether the property has ever been set.
    pub fn contains_key(&self, name: &str) -> bool {
        self.inner.properties.read().contains_key(name)
    }

    /// Property names in the order they were first set.
    pub fn keys(&self) -> Vec<String> {
        self.inner.properties.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.properties.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.properties.read().is_empty()
    }

    /// Write a property, notifying listeners.
    ///
    /// A dotted key writes through the chain: `set("a.b", v)` sets `b` on
    /// whatever `a` currently holds.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        if key.contains('.') {
            self.set_path(key, value);
            return;
        }

        let previous = self.get(key);
        if previous == value {
            return;
        }

        let path = PropertyPath::key(key);
        match self.inner.observer.will_change_at(&Target::Object(self.clone()), &path, previous) {
            WillChange::Unobserved => self.store(key, value),
            WillChange::Suppressed => {}
            WillChange::Dispatching(pending) => {
                self.store(key, value);
                pending.did_change(self.get(key));
            }
        }
    }

    fn set_path(&self, path: &str, value: Value) {
        let Some((prefix, last)) = path.rsplit_once('.') else {
            return self.set(path, value);
        };
        let owner = Target::Object(self.clone()).resolve(&PropertyPath::key(prefix));
        match owner {
            Value::Object(object) => object.set(last, value),
            Value::List(list) => match PropertyPath::key(last).as_index() {
                Some(index) => list.set(index, value),
                None => debug!(path, "cannot write a named property on a list"),
            },
            _ => debug!(path, "path does not resolve to an observable target"),
        }
    }

    fn store(&self, key: &str, value: Value) {
        self.inner.properties.write().insert(key.to_string(), value);
    }
}

impl fmt::Debug for ObservableObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableObject")
            .field("id", &self.id().raw())
            .field("identifier", &self.identifier())
            .finish()
    }
}
