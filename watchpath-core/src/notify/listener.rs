//! Listeners and Bindings
//!
//! A [`Listener`] is what application code registers. When it is registered
//! for a particular phase on a particular target, it is resolved once into a
//! [`ListenerBinding`]: the concrete thing the dispatcher calls.
//!
//! # Resolution
//!
//! - A closure listener is bound directly.
//! - A [`ChangeHandler`] object is asked, in order, for a handler named after
//!   the target's identifier (`handle_<identifier>_change`, or
//!   `handle_<identifier>_will_change` for the will-change phase), then for
//!   the generic `handle_change` / `handle_will_change`.
//! - If the object answers to neither, the binding is unresolved and is never
//!   called.
//!
//! Descriptors also listen to other descriptors while they maintain a chain;
//! those bindings refer to the listening descriptor by its registry key.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use super::descriptor::DescriptorKey;
use super::dispatch::Phase;
use super::notification::ChangeNotification;
use crate::observer::Observer;

/// Generic handler name for the change phase.
pub const HANDLE_CHANGE: &str = "handle_change";

/// Generic handler name for the will-change phase.
pub const HANDLE_WILL_CHANGE: &str = "handle_will_change";

/// Unique identifier for a listener.
///
/// Registration is idempotent per identity: registering the same listener
/// twice for the same phase keeps one binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Closure type for listener callbacks.
pub type ListenerFn = dyn Fn(&ChangeNotification) + Send + Sync;

/// A listener object whose handlers are looked up by name.
///
/// This is the convention-based alternative to registering a closure.
///
/// ```rust
/// use watchpath_core::{ChangeHandler, ChangeNotification};
///
/// struct Logger;
///
/// impl ChangeHandler for Logger {
///     fn responds_to(&self, handler: &str) -> bool {
///         handler == "handle_change"
///     }
///
///     fn invoke(&self, _handler: &str, notification: &ChangeNotification) {
///         println!("{} changed", notification.property_path());
///     }
/// }
/// ```
pub trait ChangeHandler: Send + Sync {
    /// Whether the object has a handler with this name.
    fn responds_to(&self, handler: &str) -> bool;

    /// Call the named handler.
    fn invoke(&self, handler: &str, notification: &ChangeNotification);
}

#[derive(Clone)]
pub(crate) enum ListenerKind {
    Callback(Arc<ListenerFn>),
    Handler(Arc<dyn ChangeHandler>),
    Dependent(DescriptorKey),
}

/// Something that can be registered to receive change notifications.
///
/// Clones share the identity, so the value used to register a listener can be
/// used to remove it.
#[derive(Clone)]
pub struct Listener {
    id: ListenerId,
    kind: ListenerKind,
}

impl Listener {
    /// A listener that calls `f` for every notification.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ChangeNotification) + Send + Sync + 'static,
    {
        Self {
            id: ListenerId::new(),
            kind: ListenerKind::Callback(Arc::new(f)),
        }
    }

    /// A listener object whose handlers are resolved by name.
    pub fn handler(handler: Arc<dyn ChangeHandler>) -> Self {
        Self {
            id: ListenerId::new(),
            kind: ListenerKind::Handler(handler),
        }
    }

    /// A descriptor listening on behalf of its chain.
    pub(crate) fn dependent(id: ListenerId, key: DescriptorKey) -> Self {
        Self {
            id,
            kind: ListenerKind::Dependent(key),
        }
    }

    /// Get the listener's unique ID.
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            ListenerKind::Callback(_) => "callback",
            ListenerKind::Handler(_) => "handler",
            ListenerKind::Dependent(_) => "dependent",
        };
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("kind", &kind)
            .finish()
    }
}

#[derive(Clone)]
pub(crate) enum BoundHandler {
    Callback(Arc<ListenerFn>),
    Method {
        object: Arc<dyn ChangeHandler>,
        name: Arc<str>,
    },
    Dependent(DescriptorKey),
    Unresolved,
}

/// A listener resolved for one phase on one descriptor.
#[derive(Clone)]
pub struct ListenerBinding {
    listener: ListenerId,
    handler: BoundHandler,
    listens_to_mutation: bool,
}

impl ListenerBinding {
    /// Resolve `listener` for a target with the given identifier.
    pub(crate) fn resolve(
        listener: &Listener,
        identifier: Option<&str>,
        before_change: bool,
        listens_to_mutation: bool,
    ) -> Self {
        let handler = match &listener.kind {
            ListenerKind::Callback(f) => BoundHandler::Callback(Arc::clone(f)),
            ListenerKind::Dependent(key) => BoundHandler::Dependent(key.clone()),
            ListenerKind::Handler(object) => handler_names(identifier, before_change)
                .into_iter()
                .find(|name| object.responds_to(name))
                .map_or(BoundHandler::Unresolved, |name| BoundHandler::Method {
                    object: Arc::clone(object),
                    name: Arc::from(name),
                }),
        };
        Self {
            listener: listener.id,
            handler,
            listens_to_mutation,
        }
    }

    pub fn listener(&self) -> ListenerId {
        self.listener
    }

    pub fn listens_to_mutation(&self) -> bool {
        self.listens_to_mutation
    }

    /// Whether the binding has nothing to call.
    pub fn is_unresolved(&self) -> bool {
        matches!(self.handler, BoundHandler::Unresolved)
    }

    /// The handler name a convention-based binding resolved to.
    pub fn handler_name(&self) -> Option<&str> {
        match &self.handler {
            BoundHandler::Method { name, .. } => Some(name),
            _ => None,
        }
    }

    pub(crate) fn is_dependent(&self) -> bool {
        matches!(self.handler, BoundHandler::Dependent(_))
    }

    /// Deliver a notification through this binding.
    pub(crate) fn invoke(&self, observer: &Observer, notification: &ChangeNotification, phase: Phase) {
        match &self.handler {
            BoundHandler::Callback(f) => f(notification),
            BoundHandler::Method { object, name } => object.invoke(name, notification),
            BoundHandler::Dependent(key) => {
                // The descriptor may have been torn down by an earlier listener
                // in this same dispatch.
                let Some(descriptor) = observer
                    .registry()
                    .lookup(key.target, &key.path)
                    .filter(|d| d.listener_id() == self.listener)
                else {
                    return;
                };
                match phase {
                    Phase::WillChange => descriptor.handle_will_change(observer, notification),
                    Phase::Change => descriptor.handle_change(observer, notification),
                }
            }
            BoundHandler::Unresolved => {}
        }
    }
}

impl fmt::Debug for ListenerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerBinding")
            .field("listener", &self.listener)
            .field("handler_name", &self.handler_name())
            .field("unresolved", &self.is_unresolved())
            .field("listens_to_mutation", &self.listens_to_mutation)
            .finish()
    }
}

/// Handler names to try, most specific first.
fn handler_names(identifier: Option<&str>, before_change: bool) -> Vec<String> {
    let (suffix, generic) = if before_change {
        ("will_change", HANDLE_WILL_CHANGE)
    } else {
        ("change", HANDLE_CHANGE)
    };
    let mut names = Vec::with_capacity(2);
    if let Some(identifier) = identifier.filter(|id| !id.is_empty()) {
        names.push(format!("handle_{identifier}_{suffix}"));
    }
    names.push(generic.to_string());
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static [&'static str]);

    impl ChangeHandler for Named {
        fn responds_to(&self, handler: &str) -> bool {
            self.0.iter().any(|name| *name == handler)
        }

        fn invoke(&self, _handler: &str, _notification: &ChangeNotification) {}
    }

    #[test]
    fn listener_ids_are_unique() {
        let id1 = ListenerId::new();
        let id2 = ListenerId::new();
        let id3 = ListenerId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn clones_share_identity() {
        let listener = Listener::new(|_| {});
        assert_eq!(listener.clone().id(), listener.id());
    }

    #[test]
    fn callbacks_bind_directly() {
        let binding = ListenerBinding::resolve(&Listener::new(|_| {}), Some("owner"), false, true);
        assert!(!binding.is_unresolved());
        assert!(binding.handler_name().is_none());
        assert!(binding.listens_to_mutation());
    }

    #[test]
    fn identifier_handler_wins_over_generic() {
        let listener = Listener::handler(Arc::new(Named(&["handle_owner_change", "handle_change"])));
        let binding = ListenerBinding::resolve(&listener, Some("owner"), false, false);
        assert_eq!(binding.handler_name(), Some("handle_owner_change"));

        let binding = ListenerBinding::resolve(&listener, Some("other"), false, false);
        assert_eq!(binding.handler_name(), Some("handle_change"));
    }

    #[test]
    fn will_change_uses_will_change_names() {
        let listener = Listener::handler(Arc::new(Named(&["handle_owner_will_change"])));
        let binding = ListenerBinding::resolve(&listener, Some("owner"), true, false);
        assert_eq!(binding.handler_name(), Some("handle_owner_will_change"));

        let binding = ListenerBinding::resolve(&listener, Some("owner"), false, false);
        assert!(binding.is_unresolved());
    }

    #[test]
    fn missing_handlers_leave_the_binding_unresolved() {
        let listener = Listener::handler(Arc::new(Named(&[])));
        let binding = ListenerBinding::resolve(&listener, None, false, false);
        assert!(binding.is_unresolved());
        assert_eq!(binding.listener(), listener.id());
    }
}
