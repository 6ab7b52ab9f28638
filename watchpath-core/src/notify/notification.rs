//! Change Notifications
//!
//! A notification describes one change as seen by one listener. Each binding
//! receives its own copy, so per-listener fields (`current_target` and the
//! internal routing slot) never leak from one listener to the next.

use std::fmt;

use crate::observe::{PropertyPath, Target, Value};

/// A single will-change or change event.
#[derive(Clone)]
pub struct ChangeNotification {
    target: Target,
    property_path: PropertyPath,
    minus: Value,
    plus: Value,
    current_target: Target,
    is_mutation: bool,
    index: Option<usize>,
    /// Which dependency slot of the receiving descriptor this arrived through.
    pub(crate) dependencies_index: Option<usize>,
}

impl ChangeNotification {
    /// A property replacement. `plus` is filled in once the write happened.
    pub(crate) fn property(target: Target, property_path: PropertyPath, minus: Value) -> Self {
        Self {
            current_target: target.clone(),
            target,
            property_path,
            minus,
            plus: Value::Undefined,
            is_mutation: false,
            index: None,
            dependencies_index: None,
        }
    }

    /// A bulk splice on a collection. `plus` is filled in after the splice.
    pub(crate) fn mutation(target: Target, index: usize, removed: Vec<Value>) -> Self {
        Self {
            current_target: target.clone(),
            target,
            property_path: PropertyPath::wildcard(),
            minus: Value::from(removed),
            plus: Value::Undefined,
            is_mutation: true,
            index: Some(index),
            dependencies_index: None,
        }
    }

    /// A change of the element at one collection index.
    pub(crate) fn at_index(target: Target, index: usize, minus: Value, plus: Value) -> Self {
        Self {
            current_target: target.clone(),
            target,
            property_path: PropertyPath::index(index),
            minus,
            plus,
            is_mutation: false,
            index: Some(index),
            dependencies_index: None,
        }
    }

    /// The object that physically changed.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The changed path. For listeners of a chain this is the chain itself.
    pub fn property_path(&self) -> &PropertyPath {
        &self.property_path
    }

    /// The previous value. For mutations, the removed elements as an array.
    pub fn minus(&self) -> &Value {
        &self.minus
    }

    /// The new value. For mutations, the inserted elements as an array.
    /// Always `Undefined` during the will-change phase.
    pub fn plus(&self) -> &Value {
        &self.plus
    }

    /// The object the notifying descriptor is registered on. Differs from
    /// `target` when the change happened somewhere along a chain.
    pub fn current_target(&self) -> &Target {
        &self.current_target
    }

    /// Whether this reports a bulk splice rather than a replacement.
    pub fn is_mutation(&self) -> bool {
        self.is_mutation
    }

    /// The collection index, for splices and per-index changes.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub(crate) fn set_plus(&mut self, plus: Value) {
        self.plus = plus;
    }

    pub(crate) fn set_current_target(&mut self, target: Target) {
        self.current_target = target;
    }

    pub(crate) fn present_as(&mut self, property_path: PropertyPath, minus: Value, plus: Value) {
        self.property_path = property_path;
        self.minus = minus;
        self.plus = plus;
    }
}

impl fmt::Debug for ChangeNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotification")
            .field("target", &self.target.id())
            .field("property_path", &self.property_path)
            .field("minus", &self.minus)
            .field("plus", &self.plus)
            .field("current_target", &self.current_target.id())
            .field("is_mutation", &self.is_mutation)
            .field("index", &self.index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Observer;

    #[test]
    fn mutation_carries_removed_elements() {
        let observer = Observer::new();
        let list = observer.list([1, 2, 3]);
        let mut notification = ChangeNotification::mutation(list.clone().into(), 1, vec![Value::from(2)]);

        assert!(notification.is_mutation());
        assert!(notification.property_path().is_wildcard());
        assert_eq!(notification.index(), Some(1));
        assert_eq!(notification.minus(), &Value::array([2]));
        assert!(notification.plus().is_undefined());

        notification.set_plus(Value::array([9, 8]));
        assert_eq!(notification.plus(), &Value::array([9, 8]));
    }

    #[test]
    fn index_notifications_name_the_index() {
        let observer = Observer::new();
        let list = observer.list([1]);
        let notification = ChangeNotification::at_index(list.into(), 3, Value::Undefined, Value::from(3));

        assert_eq!(notification.property_path().as_str(), "3");
        assert!(!notification.is_mutation());
        assert_eq!(notification.index(), Some(3));
    }
}
