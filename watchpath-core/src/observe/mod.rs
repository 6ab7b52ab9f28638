//! Observable Values
//!
//! This module holds the data side of the engine: dynamic values, the two
//! kinds of observable target, and property paths.
//!
//! # Concepts
//!
//! ## Objects
//!
//! An [`ObservableObject`] stores named properties. Every write goes through
//! [`ObservableObject::set`], which brackets the assignment with the
//! will-change / change protocol whenever a descriptor exists for the
//! property.
//!
//! ## Lists
//!
//! An [`ObservableList`] is an ordered collection. All structural changes are
//! range splices, which lets the diff engine compute exactly which indices
//! changed.
//!
//! ## Paths
//!
//! A [`PropertyPath`] is `*`, a single property or index, or a dotted chain.
//! Chains are resolved hop by hop against the current values, which is what
//! makes it necessary to re-subscribe when an intermediate value changes.

mod value;
mod target;
mod object;
mod list;
mod path;

pub use value::Value;
pub use target::{Observable, Target, TargetId};
pub use object::ObservableObject;
pub use list::ObservableList;
pub use path::{PropertyPath, WILDCARD};

pub(crate) use target::WeakTarget;
pub(crate) use path::walk;
