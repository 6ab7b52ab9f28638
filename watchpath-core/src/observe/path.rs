//! Property Paths
//!
//! A path names what a listener observes on a target:
//!
//! - `*` observes the target as a whole (bulk mutations of a collection)
//! - `name` observes a single property, or a collection index such as `3`
//! - `a.b.c` observes a chain, each segment resolved against the value of the
//!   previous one
//!
//! Paths are cheap to clone (the text is shared) and are used directly as
//! registry keys.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use smallvec::SmallVec;

use super::target::Target;
use crate::error::ObserveError;

/// The whole-target path.
pub const WILDCARD: &str = "*";

/// A parsed property path.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    raw: Arc<str>,
}

impl PropertyPath {
    /// Parse and validate a path.
    pub fn parse(path: &str) -> Result<Self, ObserveError> {
        if path == WILDCARD {
            return Ok(Self::wildcard());
        }
        if path.is_empty() {
            return Err(invalid(path, "path is empty"));
        }
        for segment in path.split('.') {
            if segment.is_empty() {
                return Err(invalid(path, "empty segment"));
            }
            if segment == WILDCARD {
                return Err(invalid(path, "wildcard inside a chain"));
            }
        }
        Ok(Self { raw: Arc::from(path) })
    }

    /// The whole-target path.
    pub fn wildcard() -> Self {
        Self {
            raw: Arc::from(WILDCARD),
        }
    }

    /// The path of a collection index.
    pub fn index(index: usize) -> Self {
        Self {
            raw: Arc::from(index.to_string()),
        }
    }

    /// A single-segment path from a name that is already known to be valid.
    pub(crate) fn key(name: &str) -> Self {
        Self { raw: Arc::from(name) }
    }

    /// The path as text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this is the whole-target path.
    pub fn is_wildcard(&self) -> bool {
        &*self.raw == WILDCARD
    }

    /// Whether this path has more than one segment.
    pub fn is_chain(&self) -> bool {
        self.raw.contains('.')
    }

    /// The segments of the path, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> + '_ {
        self.raw.split('.')
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments().count()
    }

    /// Paths are never empty; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The collection index this single-segment path names, if any.
    pub fn as_index(&self) -> Option<usize> {
        let raw = &*self.raw;
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        raw.parse().ok()
    }

    /// Split off the first segment.
    pub fn split_first(&self) -> (PropertyPath, Option<PropertyPath>) {
        match self.raw.split_once('.') {
            Some((head, tail)) => (Self::key(head), Some(Self::key(tail))),
            None => (self.clone(), None),
        }
    }
}

fn invalid(path: &str, reason: &'static str) -> ObserveError {
    ObserveError::InvalidPath {
        path: path.to_string(),
        reason,
    }
}

impl FromStr for PropertyPath {
    type Err = ObserveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Debug for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.raw)
    }
}

// ----------------------------------------------------------------------------
// Walking a path over live values
// ----------------------------------------------------------------------------

/// One step of a path walk: `property` read on `target`, with whatever is
/// left of the path after it.
#[derive(Clone)]
pub(crate) struct Hop {
    pub target: Target,
    pub property: PropertyPath,
    pub remaining: Option<PropertyPath>,
}

/// Walk `path` from `root` over the current values.
///
/// Every segment that can be reached produces a hop. The walk stops at the
/// first intermediate value that is not an observable target.
pub(crate) fn walk(root: &Target, path: &PropertyPath) -> SmallVec<[Hop; 4]> {
    let mut hops = SmallVec::new();
    if path.is_wildcard() {
        return hops;
    }

    let mut current = root.clone();
    let mut rest = path.clone();
    loop {
        let (property, remaining) = rest.split_first();
        let next = match &remaining {
            Some(_) => current.property(property.as_str()).as_target(),
            None => None,
        };
        hops.push(Hop {
            target: current,
            property,
            remaining: remaining.clone(),
        });
        match (remaining, next) {
            (Some(tail), Some(target)) => {
                current = target;
                rest = tail;
            }
            _ => break,
        }
    }
    hops
}
