//! Reactive Wrappers
//!
//! [`Runtime::observe`] attaches an [`Observer`] to a container and converts
//! it in place:
//!
//! - every configurable property of an object becomes a reactive slot
//!   (see [`Runtime::define_reactive`]); properties that already are keep
//!   their slot,
//! - every element of an array is observed in turn; the array itself is
//!   tracked through its observer's shape dep.
//!
//! The observer is reachable from the container, which makes observing
//! idempotent and lets cyclic graphs terminate.
//!
//! Properties added to an observed object afterwards are plain until they
//! go through [`Runtime::set`].

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use super::array::Array;
use super::dep::Dep;
use super::object::{Object, ReactiveSlot};
use super::runtime::Runtime;
use super::value::{Key, Value};
use crate::error::Warning;

/// Largest index `set` accepts on an array.
const MAX_ARRAY_INDEX: usize = u32::MAX as usize - 1;

/// The wrapper attached to an observed container.
pub struct Observer {
    dep: Dep,
    root_count: Cell<usize>,
}

impl Observer {
    fn new(runtime: &Runtime) -> Self {
        Self {
            dep: Dep::new(runtime),
            root_count: Cell::new(0),
        }
    }

    /// The shape dep: notified when entries are added, removed or reordered.
    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// How many scopes use this container as their root state.
    pub fn root_count(&self) -> usize {
        self.root_count.get()
    }

    pub(crate) fn release_root(&self) {
        self.root_count.set(self.root_count.get().saturating_sub(1));
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("dep", &self.dep)
            .field("root_count", &self.root_count())
            .finish()
    }
}

/// Options for [`Runtime::define_reactive_with`].
#[derive(Clone, Default)]
pub struct DefineOptions {
    /// Do not observe the value or depend on its shape.
    pub shallow: bool,

    /// Called before each effective write, in debug mode only.
    pub custom_setter: Option<Rc<dyn Fn()>>,
}

impl Runtime {
    /// Make a value reactive, returning its observer.
    ///
    /// Returns the existing observer when there is one. Primitives, opaque
    /// handles, frozen objects and instance objects are left alone, and so
    /// is everything while observing is switched off.
    pub fn observe(&self, value: &Value) -> Option<Rc<Observer>> {
        match value {
            Value::Object(object) => {
                if let Some(observer) = object.observer() {
                    return Some(observer);
                }
                if !self.is_observing() || object.is_frozen() || object.is_instance() {
                    return None;
                }

                let observer = Rc::new(Observer::new(self));
                object.attach_observer(observer.clone());
                for key in object.keys() {
                    let current = object.peek(&key).unwrap_or_default();
                    match object.reactive_slot(&key) {
                        // Already intercepted: keep its dep and subscribers.
                        Some(slot) => {
                            if !slot.shallow {
                                self.observe(&current);
                            }
                        }
                        None => self.define_reactive(object, &key, current),
                    }
                }
                Some(observer)
            }
            Value::Array(array) => {
                if let Some(observer) = array.observer() {
                    return Some(observer);
                }
                if !self.is_observing() {
                    return None;
                }

                let observer = Rc::new(Observer::new(self));
                array.attach_observer(observer.clone());
                for item in array.to_vec() {
                    self.observe(&item);
                }
                Some(observer)
            }
            _ => None,
        }
    }

    /// Observe a value that a scope uses as its root state.
    pub fn observe_root(&self, value: &Value) -> Option<Rc<Observer>> {
        let observer = self.observe(value)?;
        observer.root_count.set(observer.root_count.get() + 1);
        Some(observer)
    }

    /// Install a reactive property on `object`.
    pub fn define_reactive(&self, object: &Object, key: &str, value: Value) {
        self.define_reactive_with(object, key, value, DefineOptions::default());
    }

    /// Install a reactive property with extra options.
    ///
    /// Non-configurable properties cannot be intercepted and are skipped.
    pub fn define_reactive_with(
        &self,
        object: &Object,
        key: &str,
        value: Value,
        options: DefineOptions,
    ) {
        if object.is_configurable(key) == Some(false) {
            self.warn(
                Warning::NonConfigurable {
                    key: key.to_string(),
                },
                None,
            );
            return;
        }

        let dep = Dep::new(self);
        if !options.shallow {
            self.observe(&value);
        }
        object.install_reactive(
            key,
            value,
            ReactiveSlot {
                dep,
                shallow: options.shallow,
                custom_setter: options.custom_setter,
            },
        );
    }

    /// Set a property, adding it reactively if it does not exist yet.
    ///
    /// Root state and instance objects refuse new properties.
    pub fn set(&self, target: &Value, key: impl Into<Key>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();

        match target {
            Value::Array(array) => match key.as_index().filter(|i| *i <= MAX_ARRAY_INDEX) {
                Some(index) => {
                    array.pad_to(index);
                    array.splice(index, 1, vec![value]);
                }
                None => self.warn(Warning::InvalidArrayKey { key: key.to_name() }, None),
            },
            Value::Object(object) => {
                let name = key.to_name();
                if object.contains_key(&name) {
                    object.insert(name, value);
                    return;
                }
                if !self.may_reshape(object, &name) {
                    return;
                }
                match object.observer() {
                    None => object.insert(name, value),
                    Some(observer) => {
                        self.define_reactive(object, &name, value);
                        observer.dep().notify();
                    }
                }
            }
            _ => self.warn(Warning::PrimitiveTarget, None),
        }
    }

    /// Delete a property, notifying the container's shape dep.
    pub fn delete(&self, target: &Value, key: impl Into<Key>) {
        let key = key.into();

        match target {
            Value::Array(array) => {
                if let Some(index) = key.as_index() {
                    array.splice(index, 1, Vec::new());
                }
            }
            Value::Object(object) => {
                let name = key.to_name();
                if !self.may_reshape(object, &name) || !object.contains_key(&name) {
                    return;
                }
                object.remove(&name);
                if let Some(observer) = object.observer() {
                    observer.dep().notify();
                }
            }
            _ => self.warn(Warning::PrimitiveTarget, None),
        }
    }

    /// Turn observing of newly assigned values on or off.
    pub fn toggle_observing(&self, enabled: bool) {
        self.0.observing.set(enabled);
    }

    pub fn is_observing(&self) -> bool {
        self.0.observing.get()
    }

    /// Run `f` with observing switched off, restoring the previous state
    /// afterwards.
    pub fn without_observing<R>(&self, f: impl FnOnce() -> R) -> R {
        struct Restore<'a>(&'a Runtime, bool);

        impl Drop for Restore<'_> {
            fn drop(&mut self) {
                self.0.toggle_observing(self.1);
            }
        }

        let _restore = Restore(self, self.is_observing());
        self.toggle_observing(false);
        f()
    }

    fn may_reshape(&self, object: &Object, key: &str) -> bool {
        if object.is_instance() {
            self.warn(
                Warning::InstanceMutation {
                    key: key.to_string(),
                },
                None,
            );
            return false;
        }
        if object.observer().is_some_and(|observer| observer.root_count() > 0) {
            self.warn(
                Warning::RootStateMutation {
                    key: key.to_string(),
                },
                None,
            );
            return false;
        }
        true
    }
}

/// Subscribe the evaluating computation to the shape deps of every observed
/// element, since element reads cannot be intercepted.
pub(crate) fn depend_array(array: &Array) {
    for item in array.to_vec() {
        if let Some(observer) = item.observer() {
            observer.dep().depend();
        }
        if let Value::Array(nested) = &item {
            depend_array(nested);
        }
    }
}
