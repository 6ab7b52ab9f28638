//! Dispatch Protocol
//!
//! Every observed write is bracketed by two calls:
//!
//! 1. [`Observer::will_change`] before the value is stored. If a descriptor
//!    exists it is marked active and its will-change listeners run.
//!
//! 2. [`PendingChange::did_change`] after the value is stored. The descriptor
//!    rewires its own dependencies, then its change listeners run.
//!
//! The active mark is the reentrancy guard. While it is set, another write
//! to the same (target, path) is reported as [`WillChange::Suppressed`] and
//! must be dropped by the caller. The mark is owned by an RAII guard inside
//! the pending change, so it is cleared even when a listener panics.
//!
//! [`Observer::will_change`]: crate::Observer::will_change

use std::sync::Arc;

use super::descriptor::ChangeDescriptor;
use super::notification::ChangeNotification;
use crate::observe::Value;
use crate::observer::Observer;

/// Which half of the protocol is being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    WillChange,
    Change,
}

impl Phase {
    pub(crate) fn of(before_change: bool) -> Self {
        if before_change {
            Phase::WillChange
        } else {
            Phase::Change
        }
    }
}

/// What the writer must do after announcing a change.
#[must_use = "a dispatching change must be completed with `did_change`"]
pub enum WillChange {
    /// Nobody observes the property: store the value, nothing else.
    Unobserved,
    /// A dispatch for the same property is in progress: drop the write.
    Suppressed,
    /// Will-change listeners have run: store the value, then call
    /// [`PendingChange::did_change`].
    Dispatching(PendingChange),
}

impl WillChange {
    /// Whether the write should be applied.
    pub fn should_write(&self) -> bool {
        !matches!(self, WillChange::Suppressed)
    }
}

/// Guard that clears a descriptor's active mark when dropped.
pub(crate) struct ActiveGuard {
    descriptor: Arc<ChangeDescriptor>,
}

impl ActiveGuard {
    /// Mark the descriptor active, unless it already is.
    pub(crate) fn acquire(descriptor: &Arc<ChangeDescriptor>) -> Option<Self> {
        descriptor.try_activate().then(|| Self {
            descriptor: Arc::clone(descriptor),
        })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.descriptor.deactivate();
    }
}

/// The second half of a write whose will-change phase has been delivered.
pub struct PendingChange {
    observer: Observer,
    descriptor: Arc<ChangeDescriptor>,
    notification: ChangeNotification,
    _guard: ActiveGuard,
}

impl PendingChange {
    pub(crate) fn new(
        observer: Observer,
        descriptor: Arc<ChangeDescriptor>,
        notification: ChangeNotification,
        guard: ActiveGuard,
    ) -> Self {
        Self {
            observer,
            descriptor,
            notification,
            _guard: guard,
        }
    }

    /// The notification the will-change listeners received.
    pub fn notification(&self) -> &ChangeNotification {
        &self.notification
    }

    /// Deliver the change phase with the value that was actually stored.
    pub fn did_change(mut self, stored: Value) {
        self.notification.set_plus(stored);
        self.descriptor.handle_change(&self.observer, &self.notification);
    }
}
