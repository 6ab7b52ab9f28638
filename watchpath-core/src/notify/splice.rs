//! Collection Diff Engine
//!
//! Turns one range splice into the notifications it implies:
//!
//! - one mutation notification for listeners of the whole list (`*`),
//!   carrying the removed elements as `minus` and the inserted ones as `plus`
//! - one notification per observed index whose visible value changes
//!
//! Indices affected by a splice at `index` are the inserted positions and,
//! when the length changes, every position after them up to the longer of
//! the two lengths (those elements shift). Positions whose value is the same
//! before and after are skipped.

use std::ops::Range;

use super::notification::ChangeNotification;
use crate::observe::{ObservableList, PropertyPath, Target, Value};
use crate::observer::Observer;

/// A splice clamped against a snapshot of the list.
struct SplicePlan {
    before: Vec<Value>,
    index: usize,
    remove_count: usize,
    insert_count: usize,
}

impl SplicePlan {
    fn new(before: Vec<Value>, index: usize, remove_count: usize, insert_count: usize) -> Self {
        let index = index.min(before.len());
        let remove_count = remove_count.min(before.len() - index);
        Self {
            before,
            index,
            remove_count,
            insert_count,
        }
    }

    fn is_noop(&self) -> bool {
        self.remove_count == 0 && self.insert_count == 0
    }

    fn removed(&self) -> Vec<Value> {
        self.before[self.index..self.index + self.remove_count].to_vec()
    }

    fn affected(&self) -> Range<usize> {
        affected_range(self.before.len(), self.index, self.remove_count, self.insert_count)
    }

    fn old(&self, i: usize) -> Value {
        self.before.get(i).cloned().unwrap_or_default()
    }

    /// Value at `i` once the splice has been applied.
    fn projected(&self, i: usize, inserted: &[Value]) -> Value {
        let value = if i < self.index {
            self.before.get(i)
        } else if i < self.index + self.insert_count {
            inserted.get(i - self.index)
        } else {
            self.before.get(i + self.remove_count - self.insert_count)
        };
        value.cloned().unwrap_or_default()
    }
}

pub(crate) fn splice_with_notifications(
    observer: &Observer,
    list: &ObservableList,
    index: usize,
    remove_count: usize,
    inserted: Vec<Value>,
) -> Vec<Value> {
    let plan = SplicePlan::new(list.to_vec(), index, remove_count, inserted.len());
    if plan.is_noop() {
        return Vec::new();
    }

    let target = Target::List(list.clone());
    let registry = observer.registry();
    let wildcard = PropertyPath::wildcard();

    let will = ChangeNotification::mutation(target.clone(), plan.index, plan.removed());
    if let Some(whole) = registry.lookup(list.id(), &wildcard) {
        whole.handle_will_change(observer, &will);
    }
    for i in plan.affected() {
        let Some(descriptor) = registry.lookup(list.id(), &PropertyPath::index(i)) else {
            continue;
        };
        let old = plan.old(i);
        if old != plan.projected(i, &inserted) {
            let notification = ChangeNotification::at_index(target.clone(), i, old, Value::Undefined);
            descriptor.handle_will_change(observer, &notification);
        }
    }

    // Will-change listeners may have spliced the list themselves.
    let plan = SplicePlan::new(list.to_vec(), index, remove_count, inserted.len());
    let removed = list.splice_silently(plan.index, plan.remove_count, inserted.clone());
    let after = list.to_vec();

    let mut mutation = ChangeNotification::mutation(target.clone(), plan.index, removed.clone());
    mutation.set_plus(Value::from(inserted));
    if let Some(whole) = registry.lookup(list.id(), &wildcard) {
        whole.handle_change(observer, &mutation);
    }
    for i in plan.affected() {
        let Some(descriptor) = registry.lookup(list.id(), &PropertyPath::index(i)) else {
            continue;
        };
        let old = plan.old(i);
        let new = after.get(i).cloned().unwrap_or_default();
        if old != new {
            let notification = ChangeNotification::at_index(target.clone(), i, old, new);
            descriptor.handle_change(observer, &notification);
        }
    }

    removed
}

/// Indices whose value may differ after replacing `remove_count` elements at
/// `index` with `insert_count` new ones.
fn affected_range(len: usize, index: usize, remove_count: usize, insert_count: usize) -> Range<usize> {
    if insert_count == remove_count {
        index..index + insert_count
    } else {
        let max_length = len + insert_count.saturating_sub(remove_count);
        index..max_length
    }
}
