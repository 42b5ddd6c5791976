//! Sequential Containers
//!
//! Element access by index cannot be intercepted, so an [`Array`] is tracked
//! as a whole: its observer's shape dep is notified by the seven mutating
//! operations, and readers depend on that dep when they read the property
//! holding the array.
//!
//! Each mutator:
//!
//! 1. performs the mutation,
//! 2. observes any newly inserted elements,
//! 3. notifies the shape dep.
//!
//! Arrays that were never observed mutate without notifying.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use super::observer::Observer;
use super::value::Value;

/// Shared handle to a sequential container.
#[derive(Clone, Default)]
pub struct Array(Rc<RefCell<ArrayInner>>);

#[derive(Default)]
struct ArrayInner {
    items: Vec<Value>,
    observer: Option<Rc<Observer>>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`. Not tracked.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().items.get(index).cloned()
    }

    /// Snapshot of the elements. Not tracked.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().items.clone()
    }

    /// Append to the end. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        self.intercept(|items| {
            items.push(value.clone());
            (items.len(), vec![value])
        })
    }

    /// Remove from the end.
    pub fn pop(&self) -> Option<Value> {
        self.intercept(|items| (items.pop(), Vec::new()))
    }

    /// Remove from the front.
    pub fn shift(&self) -> Option<Value> {
        self.intercept(|items| {
            let removed = if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            };
            (removed, Vec::new())
        })
    }

    /// Insert at the front. Returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        self.intercept(|items| {
            items.insert(0, value.clone());
            (items.len(), vec![value])
        })
    }

    /// Remove `delete_count` elements starting at `start` and insert `items`
    /// in their place. Out-of-range arguments are clamped. Returns the
    /// removed elements.
    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Vec<Value> {
        self.intercept(|current| {
            let start = start.min(current.len());
            let end = start + delete_count.min(current.len() - start);
            let removed: Vec<Value> = current.splice(start..end, items.iter().cloned()).collect();
            (removed, items)
        })
    }

    /// Sort in place with a comparator.
    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        // The comparator may read this array or other reactive state, so it
        // sorts a copy while nothing is borrowed.
        let mut items = self.to_vec();
        items.sort_by(compare);
        self.intercept(move |current| {
            *current = items;
            ((), Vec::new())
        })
    }

    /// Sort in place: null, then booleans, numbers, strings, and everything
    /// else in its current order.
    pub fn sort(&self) {
        self.sort_by(compare_values)
    }

    pub fn reverse(&self) {
        self.intercept(|items| {
            items.reverse();
            ((), Vec::new())
        })
    }

    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.0.borrow().observer.clone()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }

    pub(crate) fn attach_observer(&self, observer: Rc<Observer>) {
        self.0.borrow_mut().observer = Some(observer);
    }

    /// Grow to `len` with nulls, bypassing interception.
    pub(crate) fn pad_to(&self, len: usize) {
        let mut inner = self.0.borrow_mut();
        if inner.items.len() < len {
            inner.items.resize(len, Value::Null);
        }
    }

    fn intercept<R>(&self, mutate: impl FnOnce(&mut Vec<Value>) -> (R, Vec<Value>)) -> R {
        let (result, inserted, observer) = {
            let mut inner = self.0.borrow_mut();
            let (result, inserted) = mutate(&mut inner.items);
            (result, inserted, inner.observer.clone())
        };

        if let Some(observer) = observer {
            let runtime = observer.dep().runtime().clone();
            for value in &inserted {
                runtime.observe(value);
            }
            observer.dep().notify();
        }

        result
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }

    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

impl From<Vec<Value>> for Array {
    fn from(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(ArrayInner {
            items,
            observer: None,
        })))
    }
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::from(iter.into_iter().map(Into::into).collect::<Vec<_>>())
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Array({})", Value::Array(self.clone()).to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(array: &Array) -> Vec<f64> {
        array.to_vec().iter().filter_map(Value::as_f64).collect()
    }

    #[test]
    fn push_pop_shift_unshift() {
        let array: Array = [1, 2].into_iter().collect();

        assert_eq!(array.push(3), 3);
        assert_eq!(array.unshift(0), 4);
        assert_eq!(numbers(&array), vec![0.0, 1.0, 2.0, 3.0]);

        assert_eq!(array.pop(), Some(Value::from(3)));
        assert_eq!(array.shift(), Some(Value::from(0)));
        assert_eq!(numbers(&array), vec![1.0, 2.0]);

        let empty = Array::new();
        assert_eq!(empty.pop(), None);
        assert_eq!(empty.shift(), None);
    }

    #[test]
    fn splice_clamps_its_range() {
        let array: Array = [1, 2, 3, 4].into_iter().collect();

        let removed = array.splice(1, 2, vec![Value::from(9)]);
        assert_eq!(removed, vec![Value::from(2), Value::from(3)]);
        assert_eq!(numbers(&array), vec![1.0, 9.0, 4.0]);

        let removed = array.splice(10, 5, vec![Value::from(5)]);
        assert!(removed.is_empty());
        assert_eq!(numbers(&array), vec![1.0, 9.0, 4.0, 5.0]);

        let removed = array.splice(2, 100, Vec::new());
        assert_eq!(removed.len(), 2);
        assert_eq!(numbers(&array), vec![1.0, 9.0]);
    }

    #[test]
    fn sort_and_reverse() {
        let array: Array = [3.0, 1.0, 2.0].into_iter().collect();
        array.sort();
        assert_eq!(numbers(&array), vec![1.0, 2.0, 3.0]);

        array.reverse();
        assert_eq!(numbers(&array), vec![3.0, 2.0, 1.0]);

        array.sort_by(|a, b| b.as_f64().partial_cmp(&a.as_f64()).unwrap_or(Ordering::Equal));
        assert_eq!(numbers(&array), vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn sort_comparator_can_read_the_array() {
        let array: Array = [3.0, 1.0, 2.0].into_iter().collect();
        let reader = array.clone();
        let mut lengths = Vec::new();

        array.sort_by(|a, b| {
            lengths.push(reader.len());
            a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Equal)
        });

        assert!(!lengths.is_empty());
        assert!(lengths.iter().all(|len| *len == 3));
        assert_eq!(numbers(&array), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn default_sort_groups_by_kind() {
        let array = Array::from(vec![
            Value::from("b"),
            Value::from(2),
            Value::Null,
            Value::from("a"),
            Value::from(true),
        ]);
        array.sort();

        assert_eq!(
            array.to_vec(),
            vec![
                Value::Null,
                Value::from(true),
                Value::from(2),
                Value::from("a"),
                Value::from("b"),
            ]
        );
    }

    #[test]
    fn pad_to_fills_with_null() {
        let array: Array = [1].into_iter().collect();
        array.pad_to(3);
        assert_eq!(array.to_vec(), vec![Value::from(1), Value::Null, Value::Null]);
        array.pad_to(1);
        assert_eq!(array.len(), 3);
    }
}
