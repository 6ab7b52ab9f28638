//! Observable Lists
//!
//! An [`ObservableList`] is an ordered collection whose structural changes all
//! go through one primitive, [`ObservableList::splice_at`]. Push, pop, shift,
//! unshift, insertion, removal and index assignment are expressed as splices,
//! so listeners see exactly one kind of bulk change no matter which operation
//! caused it.

use std::fmt;
use std::iter;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::path::PropertyPath;
use super::target::TargetId;
use super::value::Value;
use crate::notify::splice;
use crate::observer::Observer;

pub(crate) struct ListInner {
    id: TargetId,
    identifier: Option<String>,
    items: RwLock<Vec<Value>>,
    observer: Observer,
}

/// A shared handle to an observable ordered collection.
#[derive(Clone)]
pub struct ObservableList {
    inner: Arc<ListInner>,
}

impl ObservableList {
    pub(crate) fn new(observer: Observer, identifier: Option<String>, items: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(ListInner {
                id: TargetId::new(),
                identifier,
                items: RwLock::new(items),
                observer,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ListInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ListInner> {
        Arc::downgrade(&self.inner)
    }

    /// Get the list's unique ID.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// The declared identifier, if any.
    pub fn identifier(&self) -> Option<&str> {
        self.inner.identifier.as_deref()
    }

    /// The observer this list reports to.
    pub fn observer(&self) -> &Observer {
        &self.inner.observer
    }

    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.read().is_empty()
    }

    /// The element at `index`, or `Undefined` past the end.
    pub fn get(&self, index: usize) -> Value {
        self.inner
            .items
            .read()
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    /// A copy of the current elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.read().clone()
    }

    /// Property access used by path resolution: decimal indices and `length`.
    pub(crate) fn property(&self, name: &str) -> Value {
        if name == "length" {
            return Value::from(self.len());
        }
        match PropertyPath::key(name).as_index() {
            Some(index) => self.get(index),
            None => Value::Undefined,
        }
    }

    /// Replace `remove_count` elements starting at `index` with `inserted`,
    /// notifying whole-collection and per-index listeners.
    ///
    /// `index` is clamped to the length and `remove_count` to what is left
    /// after it. The clamp is repeated after will-change listeners run, since
    /// they may have changed the list. Returns the removed elements.
    pub fn splice_at<I, V>(&self, index: usize, remove_count: usize, inserted: I) -> Vec<Value>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let inserted: Vec<Value> = inserted.into_iter().map(Into::into).collect();
        splice::splice_with_notifications(&self.inner.observer, self, index, remove_count, inserted)
    }

    /// Apply a splice without notifying anyone.
    pub(crate) fn splice_silently(&self, index: usize, remove_count: usize, inserted: Vec<Value>) -> Vec<Value> {
        let mut items = self.inner.items.write();
        let index = index.min(items.len());
        let end = (index + remove_count).min(items.len());
        items.splice(index..end, inserted).collect()
    }

    /// Append one element.
    pub fn push(&self, value: impl Into<Value>) {
        self.splice_at(self.len(), 0, iter::once(value.into()));
    }

    /// Append several elements as a single splice.
    pub fn extend<I, V>(&self, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.splice_at(self.len(), 0, values);
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Option<Value> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        self.splice_at(len - 1, 1, iter::empty::<Value>()).pop()
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Option<Value> {
        if self.is_empty() {
            return None;
        }
        self.splice_at(0, 1, iter::empty::<Value>()).into_iter().next()
    }

    /// Prepend elements as a single splice.
    pub fn unshift<I, V>(&self, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.splice_at(0, 0, values);
    }

    /// Insert one element before `index`.
    pub fn insert(&self, index: usize, value: impl Into<Value>) {
        self.splice_at(index, 0, iter::once(value.into()));
    }

    /// Remove and return the element at `index`.
    pub fn remove(&self, index: usize) -> Option<Value> {
        if index >= self.len() {
            return None;
        }
        self.splice_at(index, 1, iter::empty::<Value>()).into_iter().next()
    }

    /// Assign the element at `index`. Writing past the end pads the gap with
    /// `Undefined`.
    pub fn set(&self, index: usize, value: impl Into<Value>) {
        let len = self.len();
        if index < len {
            self.splice_at(index, 1, iter::once(value.into()));
        } else {
            let padding = iter::repeat(Value::Undefined).take(index - len);
            self.splice_at(len, 0, padding.chain(iter::once(value.into())));
        }
    }

    /// Remove every element.
    pub fn clear(&self) -> Vec<Value> {
        self.splice_at(0, self.len(), iter::empty::<Value>())
    }
}

impl fmt::Debug for ObservableList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableList")
            .field("id", &self.id().raw())
            .field("identifier", &self.identifier())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(list: &ObservableList) -> Vec<f64> {
        list.to_vec().iter().filter_map(Value::as_f64).collect()
    }

    #[test]
    fn splice_returns_removed_elements() {
        let observer = Observer::new();
        let list = observer.list([1, 2, 3]);

        let removed = list.splice_at(1, 1, [9, 8]);
        assert_eq!(removed, vec![Value::from(2)]);
        assert_eq!(values(&list), vec![1.0, 9.0, 8.0, 3.0]);
    }

    #[test]
    fn splice_clamps_out_of_range_arguments() {
        let observer = Observer::new();
        let list = observer.list([1, 2, 3]);

        let removed = list.splice_at(2, 10, iter::empty::<Value>());
        assert_eq!(removed, vec![Value::from(3)]);

        let removed = list.splice_at(10, 1, [7]);
        assert!(removed.is_empty());
        assert_eq!(values(&list), vec![1.0, 2.0, 7.0]);
    }

    #[test]
    fn stack_and_queue_operations() {
        let observer = Observer::new();
        let list = observer.list(Vec::<Value>::new());

        list.push(1);
        list.extend([2, 3]);
        list.unshift([0]);
        assert_eq!(values(&list), vec![0.0, 1.0, 2.0, 3.0]);

        assert_eq!(list.pop(), Some(Value::from(3)));
        assert_eq!(list.shift(), Some(Value::from(0)));
        assert_eq!(values(&list), vec![1.0, 2.0]);

        list.insert(1, 5);
        assert_eq!(list.remove(0), Some(Value::from(1)));
        assert_eq!(values(&list), vec![5.0, 2.0]);

        assert_eq!(list.clear().len(), 2);
        assert_eq!(list.pop(), None);
        assert_eq!(list.shift(), None);
        assert_eq!(list.remove(3), None);
    }

    #[test]
    fn set_past_the_end_pads_with_undefined() {
        let observer = Observer::new();
        let list = observer.list([1]);

        list.set(3, 4);
        assert_eq!(
            list.to_vec(),
            vec![Value::from(1), Value::Undefined, Value::Undefined, Value::from(4)]
        );

        list.set(0, 9);
        assert_eq!(list.get(0), Value::from(9));
    }

    #[test]
    fn property_answers_indices_and_length() {
        let observer = Observer::new();
        let list = observer.list(["a", "b"]);
        assert_eq!(list.property("1"), Value::from("b"));
        assert_eq!(list.property("length"), Value::from(2));
        assert_eq!(list.property("name"), Value::Undefined);
    }
}
