//! Notification Registry
//!
//! The registry maps target identity → path → descriptor. It is the only
//! place descriptors are created and destroyed, which keeps exactly one
//! descriptor per (target, path) alive at any time.
//!
//! Entries are grouped per target in a [`DashMap`], so registrations on
//! unrelated targets do not contend. Shard guards are released before any
//! listener or dependency code runs.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::descriptor::ChangeDescriptor;
use super::listener::{ListenerBinding, ListenerId};
use crate::observe::{PropertyPath, Target, TargetId};

#[derive(Default)]
struct TargetEntry {
    paths: HashMap<PropertyPath, Arc<ChangeDescriptor>>,
}

/// Outcome of removing a binding.
pub(crate) enum Unregistered {
    /// Nothing is observed at this (target, path).
    NoDescriptor,
    /// A descriptor exists but the listener is not bound on it.
    NotFound,
    /// The binding was removed. `destroyed` is set when it was the last one
    /// and the descriptor has left the registry.
    Removed {
        descriptor: Arc<ChangeDescriptor>,
        destroyed: bool,
    },
}

/// Directory of live change descriptors.
#[derive(Default)]
pub struct NotificationRegistry {
    targets: DashMap<TargetId, TargetEntry>,
}

impl NotificationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a listener, creating the descriptor on first use.
    pub(crate) fn register(
        &self,
        target: &Target,
        path: &PropertyPath,
        binding: ListenerBinding,
        before_change: bool,
    ) -> Arc<ChangeDescriptor> {
        let mut entry = self.targets.entry(target.id()).or_default();
        let descriptor = entry
            .paths
            .entry(path.clone())
            .or_insert_with(|| {
                debug!(target_id = %target.id(), path = %path, "descriptor created");
                Arc::new(ChangeDescriptor::new(target, path.clone()))
            })
            .clone();
        descriptor.register_listener(binding, before_change);
        descriptor
    }

    /// Remove a listener's binding, destroying the descriptor when it was the
    /// last one.
    pub(crate) fn unregister(
        &self,
        target_id: TargetId,
        path: &PropertyPath,
        listener: ListenerId,
        before_change: bool,
    ) -> Unregistered {
        let outcome = {
            let Some(mut entry) = self.targets.get_mut(&target_id) else {
                return Unregistered::NoDescriptor;
            };
            let Some(descriptor) = entry.paths.get(path).cloned() else {
                return Unregistered::NoDescriptor;
            };
            if !descriptor.unregister_listener(listener, before_change) {
                return Unregistered::NotFound;
            }
            let destroyed = !descriptor.has_listeners();
            if destroyed {
                entry.paths.remove(path);
                debug!(target_id = %target_id, path = %path, "descriptor destroyed");
            }
            Unregistered::Removed { descriptor, destroyed }
        };

        if matches!(outcome, Unregistered::Removed { destroyed: true, .. }) {
            self.targets.remove_if(&target_id, |_, entry| entry.paths.is_empty());
        }
        outcome
    }

    /// The descriptor for (target, path), if anything listens there.
    pub fn lookup(&self, target_id: TargetId, path: &PropertyPath) -> Option<Arc<ChangeDescriptor>> {
        self.targets.get(&target_id)?.paths.get(path).cloned()
    }

    /// Number of live descriptors.
    pub fn len(&self) -> usize {
        self.targets.iter().map(|entry| entry.paths.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Every live descriptor, in no particular order.
    pub fn descriptors(&self) -> Vec<Arc<ChangeDescriptor>> {
        self.targets
            .iter()
            .flat_map(|entry| entry.paths.values().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Drop every descriptor without notifying anyone.
    pub fn clear(&self) {
        self.targets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Observable;
    use crate::notify::Listener;
    use crate::Observer;

    fn bind(listener: &Listener) -> ListenerBinding {
        ListenerBinding::resolve(listener, None, false, false)
    }

    #[test]
    fn one_descriptor_per_target_and_path() {
        let observer = Observer::new();
        let object = observer.object();
        let registry = NotificationRegistry::new();
        let path = PropertyPath::parse("x").unwrap();

        let first = registry.register(&object.as_target(), &path, bind(&Listener::new(|_| {})), false);
        let second = registry.register(&object.as_target(), &path, bind(&Listener::new(|_| {})), true);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert_eq!(first.change_listener_count(), 1);
        assert_eq!(first.will_change_listener_count(), 1);

        let other = registry.register(&object.as_target(), &PropertyPath::parse("y").unwrap(), bind(&Listener::new(|_| {})), false);
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn last_unregister_destroys_the_descriptor() {
        let observer = Observer::new();
        let object = observer.object();
        let registry = NotificationRegistry::new();
        let path = PropertyPath::parse("x").unwrap();
        let a = Listener::new(|_| {});
        let b = Listener::new(|_| {});

        registry.register(&object.as_target(), &path, bind(&a), false);
        registry.register(&object.as_target(), &path, bind(&b), false);

        assert!(matches!(
            registry.unregister(object.id(), &path, a.id(), false),
            Unregistered::Removed { destroyed: false, .. }
        ));
        assert!(matches!(
            registry.unregister(object.id(), &path, a.id(), false),
            Unregistered::NotFound
        ));
        assert!(matches!(
            registry.unregister(object.id(), &path, b.id(), false),
            Unregistered::Removed { destroyed: true, .. }
        ));
        assert!(registry.lookup(object.id(), &path).is_none());
        assert!(registry.is_empty());
        assert!(matches!(
            registry.unregister(object.id(), &path, b.id(), false),
            Unregistered::NoDescriptor
        ));
    }

    #[test]
    fn phases_are_counted_separately() {
        let observer = Observer::new();
        let object = observer.object();
        let registry = NotificationRegistry::new();
        let path = PropertyPath::parse("x").unwrap();
        let listener = Listener::new(|_| {});

        registry.register(&object.as_target(), &path, bind(&listener), false);
        registry.register(&object.as_target(), &path, bind(&listener), true);
        assert!(matches!(
            registry.unregister(object.id(), &path, listener.id(), false),
            Unregistered::Removed { destroyed: false, .. }
        ));
        assert!(registry.lookup(object.id(), &path).is_some());
    }

    #[test]
    fn clear_forgets_everything() {
        let observer = Observer::new();
        let registry = NotificationRegistry::new();
        for name in ["a", "b", "c"] {
            registry.register(
                &observer.object().as_target(),
                &PropertyPath::parse(name).unwrap(),
                bind(&Listener::new(|_| {})),
                false,
            );
        }
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.descriptors().len(), 3);

        registry.clear();
        assert!(registry.is_empty());
    }
}
