//! Key/Value Containers
//!
//! An [`Object`] is an ordered map of own properties. A property starts out
//! plain; once the object is observed, each configurable property becomes a
//! reactive slot that owns a [`Dep`]. Reading a reactive slot while a
//! computation evaluates subscribes that computation, and writing a
//! different value notifies every subscriber.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::dep::Dep;
use super::observer::{depend_array, Observer};
use super::value::{same_value, Value};

/// Shared handle to a key/value container.
#[derive(Clone, Default)]
pub struct Object(Rc<RefCell<ObjectInner>>);

#[derive(Default)]
struct ObjectInner {
    slots: IndexMap<String, Slot>,
    observer: Option<Rc<Observer>>,
    frozen: bool,
    instance: bool,
}

struct Slot {
    value: Value,
    reactive: Option<ReactiveSlot>,
    configurable: bool,
}

impl Slot {
    fn plain(value: Value) -> Self {
        Self {
            value,
            reactive: None,
            configurable: true,
        }
    }
}

/// The interception installed on a property by `define_reactive`.
#[derive(Clone)]
pub(crate) struct ReactiveSlot {
    pub(crate) dep: Dep,
    pub(crate) shallow: bool,
    pub(crate) custom_setter: Option<Rc<dyn Fn()>>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// An object standing for a live framework instance. It is never made
    /// reactive and refuses property additions through `set`/`delete`.
    pub fn new_instance() -> Self {
        let object = Self::new();
        object.0.borrow_mut().instance = true;
        object
    }

    /// Read a property, subscribing the evaluating computation if the
    /// property is reactive.
    pub fn get(&self, key: &str) -> Option<Value> {
        let (value, reactive) = {
            let inner = self.0.borrow();
            let slot = inner.slots.get(key)?;
            match &slot.reactive {
                Some(reactive) => (slot.value.clone(), reactive.clone()),
                None => return Some(slot.value.clone()),
            }
        };

        if reactive.dep.runtime().is_tracking() {
            reactive.dep.depend();
            if !reactive.shallow {
                if let Some(child) = value.observer() {
                    child.dep().depend();
                    if let Value::Array(array) = &value {
                        depend_array(array);
                    }
                }
            }
        }

        Some(value)
    }

    /// Read a property without subscribing anything.
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.0.borrow().slots.get(key).map(|slot| slot.value.clone())
    }

    /// Assign a property.
    ///
    /// Existing reactive properties go through their setter. A key that does
    /// not exist yet is added as a plain, non-reactive property; use
    /// `Runtime::set` to add a reactive one. Frozen objects ignore writes.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();

        let reactive = {
            let mut inner = self.0.borrow_mut();
            if inner.frozen {
                return;
            }
            if !inner.slots.contains_key(key.as_str()) {
                inner.slots.insert(key, Slot::plain(value));
                return;
            }
            let slot = &mut inner.slots[key.as_str()];
            match &slot.reactive {
                None => {
                    slot.value = value;
                    return;
                }
                Some(reactive) => {
                    if same_value(&slot.value, &value) {
                        return;
                    }
                    reactive.clone()
                }
            }
        };

        let runtime = reactive.dep.runtime().clone();
        if runtime.config().debug {
            if let Some(custom_setter) = &reactive.custom_setter {
                custom_setter();
            }
        }

        if let Some(slot) = self.0.borrow_mut().slots.get_mut(key.as_str()) {
            slot.value = value.clone();
        }
        if !reactive.shallow {
            runtime.observe(&value);
        }
        reactive.dep.notify();
    }

    /// Add a non-configurable property. It stays plain even when the object
    /// is observed.
    pub fn insert_fixed(&self, key: impl Into<String>, value: impl Into<Value>) {
        let mut inner = self.0.borrow_mut();
        if inner.frozen {
            return;
        }
        inner.slots.insert(
            key.into(),
            Slot {
                value: value.into(),
                reactive: None,
                configurable: false,
            },
        );
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().slots.contains_key(key)
    }

    /// Own property names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().slots.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make the object non-extensible and read-only. Frozen objects are
    /// never observed and are skipped by deep traversal.
    pub fn freeze(&self) {
        self.0.borrow_mut().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    pub fn is_instance(&self) -> bool {
        self.0.borrow().instance
    }

    /// Whether `key` is an intercepted, reactive property.
    pub fn is_reactive(&self, key: &str) -> bool {
        self.0
            .borrow()
            .slots
            .get(key)
            .is_some_and(|slot| slot.reactive.is_some())
    }

    /// The dependency node of a reactive property.
    pub fn property_dep(&self, key: &str) -> Option<Dep> {
        self.0
            .borrow()
            .slots
            .get(key)
            .and_then(|slot| slot.reactive.as_ref().map(|reactive| reactive.dep.clone()))
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

    /// `None` when the key is missing.
    pub(crate) fn is_configurable(&self, key: &str) -> Option<bool> {
        self.0.borrow().slots.get(key).map(|slot| slot.configurable)
    }

    pub(crate) fn reactive_slot(&self, key: &str) -> Option<ReactiveSlot> {
        self.0
            .borrow()
            .slots
            .get(key)
            .and_then(|slot| slot.reactive.clone())
    }

    pub(crate) fn install_reactive(&self, key: &str, value: Value, reactive: ReactiveSlot) {
        self.0.borrow_mut().slots.insert(
            key.to_string(),
            Slot {
                value,
                reactive: Some(reactive),
                configurable: true,
            },
        );
    }

    pub(crate) fn remove(&self, key: &str) -> Option<Value> {
        self.0
            .borrow_mut()
            .slots
            .shift_remove(key)
            .map(|slot| slot.value)
    }
}

impl<K, V> FromIterator<(K, V)> for Object
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let object = Self::new();
        {
            let mut inner = object.0.borrow_mut();
            for (key, value) in iter {
                inner.slots.insert(key.into(), Slot::plain(value.into()));
            }
        }
        object
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", Value::Object(self.clone()).to_json())
    }
}
