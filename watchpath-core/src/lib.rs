//! Watchpath Core
//!
//! This crate provides a property-observation engine. Objects and lists
//! report every write to an [`Observer`], and listeners registered on the
//! observer receive two notifications per write: one before the value is
//! stored (will-change) and one after (change).
//!
//! It implements:
//!
//! - Observable objects and lists with an explicit interception contract
//! - Listeners on single properties, dotted chains, and whole lists
//! - Automatic re-subscription when an intermediate value of a chain changes
//! - A per-property reentrancy guard
//! - Splice diffing into whole-list and per-index notifications
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `observe`: values, targets, and property paths
//! - `notify`: listeners, descriptors, the registry, and dispatch
//!
//! The [`Observer`] ties them together and is the entry point.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use watchpath_core::{Observer, Value};
//!
//! let observer = Observer::new();
//! let cart = observer.object();
//! let items = observer.list(["apple"]);
//! cart.set("items", items.clone());
//!
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let sink = log.clone();
//! observer
//!     .on_change(&cart, "items", move |n| {
//!         sink.lock().push((n.is_mutation(), n.plus().clone()));
//!     })
//!     .unwrap();
//!
//! // Mutating the list in place reaches listeners of the property holding it.
//! items.push("pear");
//! assert_eq!(*log.lock(), vec![(true, Value::array(["pear"]))]);
//! ```

pub mod observe;
pub mod notify;
mod observer;
mod config;
mod error;

pub use config::{ObserverConfig, Strictness};
pub use error::ObserveError;
pub use notify::{
    ChangeDescriptor, ChangeHandler, ChangeNotification, DescriptorKey, DescriptorSnapshot, Listener, ListenerBinding,
    ListenerId, NotificationRegistry, PendingChange, WillChange,
};
pub use observe::{Observable, ObservableList, ObservableObject, PropertyPath, Target, TargetId, Value, WILDCARD};
pub use observer::{ListenOptions, Observer};
