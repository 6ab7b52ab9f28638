//! The Observer
//!
//! An [`Observer`] owns one notification registry and creates the objects and
//! lists that report to it. Independent observers share nothing, so tests and
//! separate application contexts can run side by side.
//!
//! # Registration
//!
//! ```rust
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use watchpath_core::{Observer, Value};
//!
//! let observer = Observer::new();
//! let person = observer.object();
//! let address = observer.object();
//! address.set("city", "Oslo");
//! person.set("address", address.clone());
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! observer
//!     .on_change(&person, "address.city", move |n| sink.lock().push(n.plus().clone()))
//!     .unwrap();
//!
//! address.set("city", "Bergen");
//! assert_eq!(*seen.lock(), vec![Value::from("Bergen")]);
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{ObserverConfig, Strictness};
use crate::error::ObserveError;
use crate::notify::{
    ActiveGuard, ChangeDescriptor, ChangeNotification, DescriptorSnapshot, Listener, ListenerBinding, ListenerId,
    NotificationRegistry, PendingChange, Unregistered, WillChange,
};
use crate::observe::{Observable, ObservableList, ObservableObject, PropertyPath, Target, TargetId, Value};

/// Options for [`Observer::add_change_listener`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenOptions {
    /// Deliver the will-change phase instead of the change phase.
    pub before_change: bool,
    /// Do not follow list mutations of the observed value.
    pub ignore_mutation: bool,
}

impl ListenOptions {
    /// Change phase, with mutations.
    pub const CHANGE: Self = Self {
        before_change: false,
        ignore_mutation: false,
    };

    /// Will-change phase, with mutations.
    pub const WILL_CHANGE: Self = Self {
        before_change: true,
        ignore_mutation: false,
    };

    /// The same options without mutation interest.
    pub fn ignoring_mutation(self) -> Self {
        Self {
            ignore_mutation: true,
            ..self
        }
    }
}

struct ObserverInner {
    registry: NotificationRegistry,
    config: ObserverConfig,
}

/// An explicit store of change descriptors plus the factory for the
/// containers that report to it.
///
/// Clones share the store.
#[derive(Clone)]
pub struct Observer {
    inner: Arc<ObserverInner>,
}

impl Default for Observer {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer {
    pub fn new() -> Self {
        Self::with_config(ObserverConfig::default())
    }

    pub fn with_config(config: ObserverConfig) -> Self {
        Self {
            inner: Arc::new(ObserverInner {
                registry: NotificationRegistry::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.inner.config
    }

    pub(crate) fn registry(&self) -> &NotificationRegistry {
        &self.inner.registry
    }

    // ------------------------------------------------------------------------
    // Containers
    // ------------------------------------------------------------------------

    /// A new empty object.
    pub fn object(&self) -> ObservableObject {
        ObservableObject::new(self.clone(), None)
    }

    /// A new empty object whose identifier selects named handlers.
    pub fn object_with_identifier(&self, identifier: impl Into<String>) -> ObservableObject {
        ObservableObject::new(self.clone(), Some(identifier.into()))
    }

    /// A new list holding `items`.
    pub fn list<I, V>(&self, items: I) -> ObservableList
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        ObservableList::new(self.clone(), None, items.into_iter().map(Into::into).collect())
    }

    /// A new list whose identifier selects named handlers.
    pub fn list_with_identifier<I, V>(&self, identifier: impl Into<String>, items: I) -> ObservableList
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        ObservableList::new(
            self.clone(),
            Some(identifier.into()),
            items.into_iter().map(Into::into).collect(),
        )
    }

    /// Build observable containers from a JSON document.
    ///
    /// JSON objects become [`ObservableObject`]s and arrays become
    /// [`ObservableList`]s, recursively.
    pub fn import_json(&self, json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            serde_json::Value::String(s) => Value::from(s.as_str()),
            serde_json::Value::Array(items) => Value::List(self.list(items.iter().map(|item| self.import_json(item)))),
            serde_json::Value::Object(fields) => {
                let object = self.object();
                for (key, value) in fields {
                    object.set(key, self.import_json(value));
                }
                Value::Object(object)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Register `listener` for changes of `path` on `target`.
    ///
    /// Registering the same listener twice for the same phase is a no-op.
    pub fn add_change_listener(
        &self,
        target: &impl Observable,
        path: &str,
        listener: &Listener,
        options: ListenOptions,
    ) -> Result<(), ObserveError> {
        let path = PropertyPath::parse(path)?;
        let target = target.as_target();
        let binding = ListenerBinding::resolve(
            listener,
            target.identifier(),
            options.before_change,
            !options.ignore_mutation,
        );

        if binding.is_unresolved() {
            match self.inner.config.unresolved_handlers {
                Strictness::Strict => {
                    return Err(ObserveError::UnresolvedHandler {
                        listener: listener.id(),
                        path: path.to_string(),
                    })
                }
                Strictness::Lenient => {
                    warn!(listener = %listener.id(), path = %path, "no handler resolved, listener will never be called");
                }
            }
        }

        self.attach(&target, &path, binding, options.before_change);
        Ok(())
    }

    /// Remove `listener` from `path` on `target` for one phase.
    pub fn remove_change_listener(
        &self,
        target: &impl Observable,
        path: &str,
        listener: &Listener,
        before_change: bool,
    ) -> Result<(), ObserveError> {
        let path = PropertyPath::parse(path)?;
        let removed = self.detach(target.as_target().id(), &path, listener.id(), before_change);
        if !removed && self.inner.config.missing_listeners == Strictness::Strict {
            return Err(ObserveError::ListenerNotFound {
                listener: listener.id(),
                path: path.to_string(),
            });
        }
        Ok(())
    }

    /// Register a closure for the change phase and return its listener, which
    /// is what [`remove_change_listener`](Self::remove_change_listener) takes.
    pub fn on_change<F>(&self, target: &impl Observable, path: &str, f: F) -> Result<Listener, ObserveError>
    where
        F: Fn(&ChangeNotification) + Send + Sync + 'static,
    {
        let listener = Listener::new(f);
        self.add_change_listener(target, path, &listener, ListenOptions::CHANGE)?;
        Ok(listener)
    }

    /// Register a closure for the will-change phase.
    pub fn on_will_change<F>(&self, target: &impl Observable, path: &str, f: F) -> Result<Listener, ObserveError>
    where
        F: Fn(&ChangeNotification) + Send + Sync + 'static,
    {
        let listener = Listener::new(f);
        self.add_change_listener(target, path, &listener, ListenOptions::WILL_CHANGE)?;
        Ok(listener)
    }

    /// The descriptor for (target, path), if anything listens there.
    pub fn get_change_descriptor(&self, target: &impl Observable, path: &str) -> Option<Arc<ChangeDescriptor>> {
        let path = PropertyPath::parse(path).ok()?;
        self.inner.registry.lookup(target.as_target().id(), &path)
    }

    /// Bind and wire up whatever the path needs.
    pub(crate) fn attach(
        &self,
        target: &Target,
        path: &PropertyPath,
        binding: ListenerBinding,
        before_change: bool,
    ) -> Arc<ChangeDescriptor> {
        let wants_mutation = binding.listens_to_mutation();
        let descriptor = self.inner.registry.register(target, path, binding, before_change);

        if path.is_chain() {
            descriptor.setup_dependencies(self, target, before_change, wants_mutation);
        } else if wants_mutation && !path.is_wildcard() {
            descriptor.update_mutation_dependency(self, &target.property(path.as_str()));
        }
        descriptor
    }

    /// Unbind and tear down what is no longer needed. Returns whether the
    /// listener was bound.
    pub(crate) fn detach(&self, target_id: TargetId, path: &PropertyPath, listener: ListenerId, before_change: bool) -> bool {
        match self.inner.registry.unregister(target_id, path, listener, before_change) {
            Unregistered::Removed {
                descriptor,
                destroyed: true,
            } => {
                descriptor.remove_dependencies(self);
                true
            }
            Unregistered::Removed { descriptor, .. } => {
                if descriptor.mutation_listener_count() == 0 {
                    descriptor.update_mutation_dependency(self, &Value::Undefined);
                }
                true
            }
            Unregistered::NotFound | Unregistered::NoDescriptor => false,
        }
    }

    // ------------------------------------------------------------------------
    // Interception contract
    // ------------------------------------------------------------------------

    /// Announce that `path` on `target` is about to change from `previous`.
    ///
    /// Containers other than the built-in ones call this before storing a
    /// value and act on the answer: see [`WillChange`].
    pub fn will_change(&self, target: &impl Observable, path: &str, previous: Value) -> Result<WillChange, ObserveError> {
        let path = PropertyPath::parse(path)?;
        Ok(self.will_change_at(&target.as_target(), &path, previous))
    }

    pub(crate) fn will_change_at(&self, target: &Target, path: &PropertyPath, previous: Value) -> WillChange {
        let Some(descriptor) = self.inner.registry.lookup(target.id(), path) else {
            return WillChange::Unobserved;
        };
        let Some(guard) = ActiveGuard::acquire(&descriptor) else {
            debug!(target_id = %target.id(), path = %path, "write suppressed during its own dispatch");
            return WillChange::Suppressed;
        };

        let notification = ChangeNotification::property(target.clone(), path.clone(), previous);
        descriptor.handle_will_change(self, &notification);
        WillChange::Dispatching(PendingChange::new(self.clone(), descriptor, notification, guard))
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    /// Number of live descriptors.
    pub fn descriptor_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Every live descriptor, ordered by target then path.
    pub fn snapshot(&self) -> Vec<DescriptorSnapshot> {
        let mut snapshots: Vec<_> = self
            .inner
            .registry
            .descriptors()
            .iter()
            .map(|descriptor| descriptor.snapshot())
            .collect();
        snapshots.sort_by(|a, b| (a.target, &a.path).cmp(&(b.target, &b.path)));
        snapshots
    }

    /// The snapshot as pretty-printed JSON.
    pub fn dump_json(&self) -> Result<String, ObserveError> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// Forget every listener without notifying anyone.
    pub fn reset(&self) {
        self.inner.registry.clear();
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("descriptors", &self.descriptor_count())
            .field("config", &self.inner.config)
            .finish()
    }
}
