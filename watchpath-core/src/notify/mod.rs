//! Change Notification Engine
//!
//! This module delivers notifications for the values in [`crate::observe`].
//!
//! # Concepts
//!
//! ## Listeners
//!
//! A [`Listener`] is a closure or a [`ChangeHandler`] object. Registering it
//! on a (target, path) for one phase produces a [`ListenerBinding`].
//!
//! ## Descriptors
//!
//! A [`ChangeDescriptor`] exists for every (target, path) that has at least
//! one binding. The [`NotificationRegistry`] creates it on the first
//! registration and destroys it when the last binding goes away.
//!
//! ## Phases
//!
//! Each write produces a will-change notification before the value is stored
//! and a change notification after. See [`WillChange`] and [`PendingChange`].
//!
//! ## Splices
//!
//! List mutations are diffed into one whole-list notification plus one
//! notification per observed index whose value changed.

mod listener;
mod notification;
mod descriptor;
mod registry;
mod dispatch;
pub(crate) mod splice;

pub use listener::{ChangeHandler, Listener, ListenerBinding, ListenerFn, ListenerId, HANDLE_CHANGE, HANDLE_WILL_CHANGE};
pub use notification::ChangeNotification;
pub use descriptor::{ChangeDescriptor, DescriptorKey, DescriptorSnapshot, EdgeSnapshot};
pub use registry::NotificationRegistry;
pub use dispatch::{PendingChange, WillChange};

pub(crate) use dispatch::ActiveGuard;
pub(crate) use registry::Unregistered;
