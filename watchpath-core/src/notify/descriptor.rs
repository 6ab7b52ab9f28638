//! Change Descriptors
//!
//! A descriptor is the bookkeeping record for one (target, path) pair that
//! has at least one listener. It owns the listener bindings for both phases
//! and, for dotted paths, the dependency edges that keep the chain subscribed
//! as intermediate values are replaced.
//!
//! # Dependency Edges
//!
//! Observing `a.b.c` on `root` means listening to `a` on `root`, to `b` on
//! whatever `root.a` holds, and to `c` on whatever that holds. Each of those
//! hops is recorded as an edge `(target, property, remaining)` in the
//! descriptor's slot list, and the hop's own descriptor records a back-pointer
//! (this descriptor's listener id → slot). When a hop changes, the back-pointer
//! tells this descriptor which slot fired, so it can tear down the suffix
//! rooted at the old value and subscribe it on the new one without walking the
//! whole chain again.
//!
//! Slots are stable: removing an edge leaves a hole, so back-pointers held by
//! other descriptors never go stale.
//!
//! # Mutation Dependency
//!
//! A listener that wants mutation notifications on a property holding a list
//! is also subscribed to the list itself (path `*`). That subscription moves
//! whenever the property starts holding a different list.
//!
//! # Locking
//!
//! Descriptor state sits behind a `parking_lot` mutex. The lock is only held
//! for bookkeeping and never while calling into the registry or a listener.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{error, trace, warn};

use super::dispatch::Phase;
use super::listener::{Listener, ListenerBinding, ListenerId};
use super::notification::ChangeNotification;
use crate::observe::{walk, PropertyPath, Target, TargetId, Value, WeakTarget};
use crate::observer::Observer;

/// Registry key of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorKey {
    pub target: TargetId,
    pub path: PropertyPath,
}

impl fmt::Display for DescriptorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target, self.path)
    }
}

/// One hop of a chain this descriptor is subscribed to.
#[derive(Clone)]
struct DependencyEdge {
    target: WeakTarget,
    target_id: TargetId,
    property: PropertyPath,
    remaining: Option<PropertyPath>,
}

impl DependencyEdge {
    fn matches(&self, target_id: TargetId, property: &PropertyPath, remaining: Option<&PropertyPath>) -> bool {
        self.target_id == target_id && &self.property == property && self.remaining.as_ref() == remaining
    }
}

#[derive(Default)]
struct DescriptorState {
    will_change_listeners: IndexMap<ListenerId, ListenerBinding>,
    change_listeners: IndexMap<ListenerId, ListenerBinding>,
    mutation_listeners_count: usize,
    dependencies: Vec<Option<DependencyEdge>>,
    /// Other descriptors' listener ids → slot in *their* dependency list.
    dependent_descriptors_index: HashMap<ListenerId, usize>,
    has_will_change_dependencies: bool,
    has_change_dependencies: bool,
    mutation_dependency_index: Option<usize>,
}

impl DescriptorState {
    fn listeners(&self, phase: Phase) -> &IndexMap<ListenerId, ListenerBinding> {
        match phase {
            Phase::WillChange => &self.will_change_listeners,
            Phase::Change => &self.change_listeners,
        }
    }

    fn listeners_mut(&mut self, phase: Phase) -> &mut IndexMap<ListenerId, ListenerBinding> {
        match phase {
            Phase::WillChange => &mut self.will_change_listeners,
            Phase::Change => &mut self.change_listeners,
        }
    }

    fn edge(&self, slot: usize) -> Option<&DependencyEdge> {
        self.dependencies.get(slot).and_then(Option::as_ref)
    }

    /// Remove the edges recorded for `suffix` and for every shorter suffix of
    /// it, which is everything a hop with that remaining path subscribed.
    fn take_suffix_edges(&mut self, suffix: &PropertyPath) -> Vec<DependencyEdge> {
        let mut levels: SmallVec<[(PropertyPath, Option<PropertyPath>); 4]> = SmallVec::new();
        let mut rest = Some(suffix.clone());
        while let Some(path) = rest {
            let (head, tail) = path.split_first();
            levels.push((head, tail.clone()));
            rest = tail;
        }

        let mut taken = Vec::new();
        for entry in self.dependencies.iter_mut() {
            let below = entry.as_ref().is_some_and(|edge| {
                levels
                    .iter()
                    .any(|(property, remaining)| edge.property == *property && edge.remaining == *remaining)
            });
            if below {
                taken.extend(entry.take());
            }
        }
        taken
    }
}

/// Listener bookkeeping and dependency edges for one (target, path).
pub struct ChangeDescriptor {
    key: DescriptorKey,
    /// Identity used when this descriptor listens to other descriptors.
    listener_id: ListenerId,
    target: WeakTarget,
    active: AtomicBool,
    state: Mutex<DescriptorState>,
}

impl ChangeDescriptor {
    pub(crate) fn new(target: &Target, path: PropertyPath) -> Self {
        Self {
            key: DescriptorKey {
                target: target.id(),
                path,
            },
            listener_id: ListenerId::new(),
            target: target.downgrade(),
            active: AtomicBool::new(false),
            state: Mutex::new(DescriptorState::default()),
        }
    }

    pub fn key(&self) -> &DescriptorKey {
        &self.key
    }

    pub fn target_id(&self) -> TargetId {
        self.key.target
    }

    pub fn path(&self) -> &PropertyPath {
        &self.key.path
    }

    /// The observed target, if it is still alive.
    pub fn target(&self) -> Option<Target> {
        self.target.upgrade()
    }

    /// The id this descriptor registers under when it listens to its hops.
    pub fn listener_id(&self) -> ListenerId {
        self.listener_id
    }

    /// Whether a dispatch for this (target, path) is in progress.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn will_change_listener_count(&self) -> usize {
        self.state.lock().will_change_listeners.len()
    }

    pub fn change_listener_count(&self) -> usize {
        self.state.lock().change_listeners.len()
    }

    pub fn mutation_listener_count(&self) -> usize {
        self.state.lock().mutation_listeners_count
    }

    /// Number of live dependency edges.
    pub fn dependency_count(&self) -> usize {
        self.state.lock().dependencies.iter().flatten().count()
    }

    /// Number of other descriptors that hold an edge to this one.
    pub fn dependent_count(&self) -> usize {
        self.state.lock().dependent_descriptors_index.len()
    }

    pub fn has_listeners(&self) -> bool {
        let state = self.state.lock();
        !state.will_change_listeners.is_empty() || !state.change_listeners.is_empty()
    }

    pub fn has_will_change_dependencies(&self) -> bool {
        self.state.lock().has_will_change_dependencies
    }

    pub fn has_change_dependencies(&self) -> bool {
        self.state.lock().has_change_dependencies
    }

    /// Whether `listener` is bound for the given phase.
    pub fn is_registered(&self, listener: ListenerId, before_change: bool) -> bool {
        self.state
            .lock()
            .listeners(Phase::of(before_change))
            .contains_key(&listener)
    }

    /// A serializable picture of the descriptor.
    pub fn snapshot(&self) -> DescriptorSnapshot {
        let state = self.state.lock();
        DescriptorSnapshot {
            target: self.key.target,
            path: self.key.path.to_string(),
            will_change_listeners: state.will_change_listeners.len(),
            change_listeners: state.change_listeners.len(),
            mutation_listeners: state.mutation_listeners_count,
            dependencies: state
                .dependencies
                .iter()
                .flatten()
                .map(|edge| EdgeSnapshot {
                    target: edge.target_id,
                    property: edge.property.to_string(),
                    remaining: edge.remaining.as_ref().map(ToString::to_string),
                })
                .collect(),
            dependents: state.dependent_descriptors_index.len(),
            active: self.is_active(),
        }
    }

    // ------------------------------------------------------------------------
    // Listener bookkeeping
    // ------------------------------------------------------------------------

    /// Add a binding. Returns `false` when the listener was already bound for
    /// this phase, in which case nothing changes.
    pub(crate) fn register_listener(&self, binding: ListenerBinding, before_change: bool) -> bool {
        let mut state = self.state.lock();
        let listens_to_mutation = binding.listens_to_mutation();
        let listeners = state.listeners_mut(Phase::of(before_change));
        if listeners.contains_key(&binding.listener()) {
            return false;
        }
        listeners.insert(binding.listener(), binding);
        if listens_to_mutation {
            state.mutation_listeners_count += 1;
        }
        true
    }

    /// Remove a binding. Returns `false` when the listener was not bound.
    pub(crate) fn unregister_listener(&self, listener: ListenerId, before_change: bool) -> bool {
        let mut state = self.state.lock();
        let Some(binding) = state.listeners_mut(Phase::of(before_change)).shift_remove(&listener) else {
            return false;
        };
        if binding.listens_to_mutation() {
            state.mutation_listeners_count -= 1;
        }
        true
    }

    pub(crate) fn try_activate(&self) -> bool {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn record_dependent(&self, dependent: ListenerId, slot: usize) {
        self.state
            .lock()
            .dependent_descriptors_index
            .entry(dependent)
            .or_insert(slot);
    }

    fn forget_dependent(&self, dependent: ListenerId) {
        self.state.lock().dependent_descriptors_index.remove(&dependent);
    }

    fn dependent_binding(&self, before_change: bool, listens_to_mutation: bool) -> ListenerBinding {
        let listener = Listener::dependent(self.listener_id, self.key.clone());
        ListenerBinding::resolve(&listener, None, before_change, listens_to_mutation)
    }

    // ------------------------------------------------------------------------
    // Dependency graph
    // ------------------------------------------------------------------------

    /// Subscribe to every hop of this descriptor's chain, starting at `root`.
    ///
    /// Change listeners are always installed on the hops: the new value of a
    /// hop is what the rest of the chain has to be subscribed on. Will-change
    /// listeners only when asked for. When the hops are already known and
    /// only the will-change phase is missing, the known edges are reused.
    pub(crate) fn setup_dependencies(&self, observer: &Observer, root: &Target, before_change: bool, mutation: bool) {
        let (has_change, has_will, known) = {
            let state = self.state.lock();
            let known: SmallVec<[DependencyEdge; 4]> = state.dependencies.iter().flatten().cloned().collect();
            (state.has_change_dependencies, state.has_will_change_dependencies, known)
        };

        if has_change {
            if has_will || !before_change {
                return;
            }
            for edge in known {
                let Some(target) = edge.target.upgrade() else {
                    continue;
                };
                let listens = mutation && edge.remaining.is_none();
                observer.attach(&target, &edge.property, self.dependent_binding(true, listens), true);
            }
        } else {
            for hop in walk(root, &self.key.path) {
                let listens = mutation && hop.remaining.is_none();
                if before_change {
                    observer.attach(&hop.target, &hop.property, self.dependent_binding(true, listens), true);
                }
                observer.attach(&hop.target, &hop.property, self.dependent_binding(false, listens), false);
                self.register_dependency(observer, &hop.target, &hop.property, hop.remaining);
            }
        }

        let mut state = self.state.lock();
        if state.has_change_dependencies {
            state.has_will_change_dependencies = true;
        } else {
            state.has_will_change_dependencies = before_change;
            state.has_change_dependencies = true;
        }
    }

    /// Record an edge and its back-pointer. Returns the edge's slot, or
    /// `None` when the hop has no descriptor to point back from.
    ///
    /// An identical edge is never stored twice; its existing slot is reused.
    pub(crate) fn register_dependency(
        &self,
        observer: &Observer,
        target: &Target,
        property: &PropertyPath,
        remaining: Option<PropertyPath>,
    ) -> Option<usize> {
        let dependency = observer.registry().lookup(target.id(), property)?;

        let slot = {
            let mut state = self.state.lock();
            let existing = state
                .dependencies
                .iter()
                .position(|edge| edge.as_ref().is_some_and(|e| e.matches(target.id(), property, remaining.as_ref())));
            match existing {
                Some(slot) => slot,
                None => {
                    let edge = DependencyEdge {
                        target: target.downgrade(),
                        target_id: target.id(),
                        property: property.clone(),
                        remaining,
                    };
                    match state.dependencies.iter().position(Option::is_none) {
                        Some(free) => {
                            state.dependencies[free] = Some(edge);
                            free
                        }
                        None => {
                            state.dependencies.push(Some(edge));
                            state.dependencies.len() - 1
                        }
                    }
                }
            }
        };

        dependency.record_dependent(self.listener_id, slot);
        Some(slot)
    }

    /// Remove an edge and its back-pointer.
    ///
    /// # Panics
    ///
    /// Panics if the edge is not recorded. That means the dependency graph
    /// no longer matches the values it was built from.
    pub(crate) fn unregister_dependency(
        &self,
        observer: &Observer,
        target_id: TargetId,
        property: &PropertyPath,
        remaining: Option<&PropertyPath>,
    ) {
        let removed = {
            let mut state = self.state.lock();
            let slot = state
                .dependencies
                .iter()
                .position(|edge| edge.as_ref().is_some_and(|e| e.matches(target_id, property, remaining)));
            if let Some(slot) = slot {
                state.dependencies[slot] = None;
                if state.mutation_dependency_index == Some(slot) {
                    state.mutation_dependency_index = None;
                }
            }
            slot.is_some()
        };

        if !removed {
            error!(
                descriptor = %self.key,
                target_id = %target_id,
                property = %property,
                remaining = ?remaining,
                "dependency edge not found"
            );
            panic!("dependency edge {target_id}:{property} is not recorded on {}", self.key);
        }

        // The hop's descriptor is gone if this was its last listener.
        if let Some(dependency) = observer.registry().lookup(target_id, property) {
            dependency.forget_dependent(self.listener_id);
        }
    }

    /// Move the suffix recorded at `slot` onto `new`.
    ///
    /// The old subscriptions are the edges recorded under the slot's remaining
    /// path. The previous value is not walked again: a listener earlier in
    /// the same dispatch may already have changed what it holds.
    pub(crate) fn update_dependencies_at_index(&self, observer: &Observer, slot: usize, new: &Value) {
        let (remaining, stale, has_will, has_change, wants_mutation) = {
            let mut state = self.state.lock();
            let Some(edge) = state.edge(slot) else {
                warn!(descriptor = %self.key, slot, "notification routed through an empty dependency slot");
                return;
            };
            let Some(remaining) = edge.remaining.clone() else {
                return;
            };
            let stale = state.take_suffix_edges(&remaining);
            (
                remaining,
                stale,
                state.has_will_change_dependencies,
                state.has_change_dependencies,
                state.mutation_listeners_count > 0,
            )
        };

        self.release_edges(observer, stale);

        if let Some(new_root) = new.as_target() {
            for hop in walk(&new_root, &remaining) {
                let listens = wants_mutation && hop.remaining.is_none();
                if has_will {
                    observer.attach(&hop.target, &hop.property, self.dependent_binding(true, listens), true);
                }
                if has_change {
                    observer.attach(&hop.target, &hop.property, self.dependent_binding(false, listens), false);
                }
                self.register_dependency(observer, &hop.target, &hop.property, hop.remaining);
            }
        }
    }

    /// Rewire whatever the notification invalidated.
    ///
    /// A notification relayed through an edge moves that edge's suffix. A
    /// direct replacement of the observed value moves the mutation
    /// dependency. Splices only reach this descriptor through edges that end
    /// at the list, and the list itself stays in place, so they move nothing.
    pub(crate) fn update_dependencies(&self, observer: &Observer, notification: &ChangeNotification) {
        match notification.dependencies_index {
            Some(_) if notification.is_mutation() => {}
            Some(slot) => {
                self.update_dependencies_at_index(observer, slot, notification.plus());
            }
            None => {
                if !notification.is_mutation() && self.mutation_listener_count() > 0 {
                    self.update_mutation_dependency(observer, notification.plus());
                }
            }
        }
    }

    /// Keep the direct subscription on the list `value` refers to.
    ///
    /// At most one such subscription exists. It is dropped when nobody wants
    /// mutations any more or `value` is not a list.
    pub(crate) fn update_mutation_dependency(&self, observer: &Observer, value: &Value) {
        let (current, will_count, change_count, wants) = {
            let state = self.state.lock();
            let current = state
                .mutation_dependency_index
                .and_then(|slot| state.edge(slot))
                .map(|edge| edge.target_id);
            (
                current,
                state.will_change_listeners.len(),
                state.change_listeners.len(),
                state.mutation_listeners_count > 0,
            )
        };
        let next = value.as_list().filter(|_| wants).cloned().map(Target::List);
        let wildcard = PropertyPath::wildcard();

        if let Some(current) = current {
            if next.as_ref().is_some_and(|list| list.id() == current) {
                if let Some(list) = &next {
                    self.attach_mutation_phases(observer, list, will_count, change_count);
                }
                return;
            }
            observer.detach(current, &wildcard, self.listener_id, true);
            observer.detach(current, &wildcard, self.listener_id, false);
            self.unregister_dependency(observer, current, &wildcard, None);
        }

        if let Some(list) = next {
            self.attach_mutation_phases(observer, &list, will_count, change_count);
            let slot = self.register_dependency(observer, &list, &wildcard, None);
            self.state.lock().mutation_dependency_index = slot;
        }
    }

    fn attach_mutation_phases(&self, observer: &Observer, list: &Target, will_count: usize, change_count: usize) {
        let wildcard = PropertyPath::wildcard();
        if will_count > 0 {
            observer.attach(list, &wildcard, self.dependent_binding(true, true), true);
        }
        if change_count > 0 {
            observer.attach(list, &wildcard, self.dependent_binding(false, true), false);
        }
    }

    /// Tear down every edge. Called when the descriptor is destroyed.
    pub(crate) fn remove_dependencies(&self, observer: &Observer) {
        let edges: Vec<DependencyEdge> = {
            let mut state = self.state.lock();
            state.has_will_change_dependencies = false;
            state.has_change_dependencies = false;
            state.mutation_dependency_index = None;
            state.dependencies.drain(..).flatten().collect()
        };
        self.release_edges(observer, edges);
    }

    /// Unbind from the hops of edges already taken out of the slot list.
    fn release_edges(&self, observer: &Observer, edges: Vec<DependencyEdge>) {
        for edge in edges {
            if let Some(dependency) = observer.registry().lookup(edge.target_id, &edge.property) {
                dependency.forget_dependent(self.listener_id);
            }
            observer.detach(edge.target_id, &edge.property, self.listener_id, true);
            observer.detach(edge.target_id, &edge.property, self.listener_id, false);
        }
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Fire will-change bindings in registration order.
    pub fn handle_will_change(&self, observer: &Observer, notification: &ChangeNotification) {
        self.dispatch(observer, notification, Phase::WillChange);
    }

    /// Rewire dependencies, then fire change bindings in registration order.
    pub fn handle_change(&self, observer: &Observer, notification: &ChangeNotification) {
        self.update_dependencies(observer, notification);
        self.dispatch(observer, notification, Phase::Change);
    }

    fn dispatch(&self, observer: &Observer, notification: &ChangeNotification, phase: Phase) {
        // Copy what is needed out of the lock; listeners may re-enter.
        let (bindings, suffix) = {
            let state = self.state.lock();
            let bindings: SmallVec<[(ListenerBinding, Option<usize>); 4]> = state
                .listeners(phase)
                .values()
                .map(|binding| {
                    let route = state.dependent_descriptors_index.get(&binding.listener()).copied();
                    (binding.clone(), route)
                })
                .collect();
            let suffix = notification
                .dependencies_index
                .and_then(|slot| state.edge(slot))
                .map(|edge| edge.remaining.clone());
            (bindings, suffix)
        };
        if bindings.is_empty() {
            return;
        }
        let Some(current_target) = self.target.upgrade() else {
            return;
        };

        trace!(
            descriptor = %self.key,
            ?phase,
            listeners = bindings.len(),
            source = %notification.target().id(),
            "dispatching"
        );

        let presented = self.present(notification, suffix, phase);
        for (binding, route) in bindings {
            // Removed by an earlier listener of this dispatch.
            if !self.is_registered(binding.listener(), phase == Phase::WillChange) {
                continue;
            }
            if notification.is_mutation() && !binding.listens_to_mutation() {
                continue;
            }
            let mut delivered = if binding.is_dependent() {
                notification.clone()
            } else {
                presented.clone()
            };
            delivered.set_current_target(current_target.clone());
            delivered.dependencies_index = route;
            binding.invoke(observer, &delivered, phase);
        }
    }

    /// How a notification looks to this descriptor's own listeners.
    ///
    /// A change that reaches a chain through one of its hops is reported as a
    /// change of the whole chain, with old and new values read through the
    /// rest of the path.
    fn present(&self, notification: &ChangeNotification, suffix: Option<Option<PropertyPath>>, phase: Phase) -> ChangeNotification {
        let mut presented = notification.clone();
        let Some(suffix) = suffix else {
            return presented;
        };
        if notification.is_mutation() || !self.key.path.is_chain() {
            return presented;
        }

        let through = |value: &Value| match &suffix {
            Some(rest) => value.as_target().map(|t| t.resolve(rest)).unwrap_or_default(),
            None => value.clone(),
        };
        let minus = through(notification.minus());
        let plus = match phase {
            Phase::WillChange => Value::Undefined,
            Phase::Change => through(notification.plus()),
        };
        presented.present_as(self.key.path.clone(), minus, plus);
        presented
    }
}

impl fmt::Debug for ChangeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeDescriptor")
            .field("key", &self.key)
            .field("listener_id", &self.listener_id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Serializable view of a descriptor, for debugging dumps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorSnapshot {
    pub target: TargetId,
    pub path: String,
    pub will_change_listeners: usize,
    pub change_listeners: usize,
    pub mutation_listeners: usize,
    pub dependencies: Vec<EdgeSnapshot>,
    pub dependents: usize,
    pub active: bool,
}

/// Serializable view of one dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeSnapshot {
    pub target: TargetId,
    pub property: String,
    pub remaining: Option<String>,
}
