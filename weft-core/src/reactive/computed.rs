//! Computed Values
//!
//! A computed value is a cached derivation backed by a lazy computation.
//!
//! # How Computed Values Work
//!
//! 1. Nothing runs on creation; the computation starts out dirty.
//!
//! 2. On access, a dirty computation re-evaluates and caches the result.
//!    A clean one returns the cache.
//!
//! 3. When a dependency changes, the computation is only marked dirty.
//!    Values that are never read again are never recomputed.
//!
//! 4. If another computation is evaluating during the access, it is
//!    subscribed to everything the computed value depends on, so it is
//!    notified directly by the underlying state.

use std::fmt;
use std::rc::Rc;

use super::computation::Computation;
use super::scope::Scope;
use super::value::Value;
use crate::error::{ReactiveError, Warning};

/// Write half of a writable computed value.
pub type Setter = Rc<dyn Fn(&Scope, Value)>;

/// A lazily evaluated, cached derived value.
#[derive(Clone)]
pub struct Computed {
    computation: Computation,
    setter: Option<Setter>,
}

impl Computed {
    pub(crate) fn new(computation: Computation, setter: Option<Setter>) -> Self {
        Self {
            computation,
            setter,
        }
    }

    /// Current value, recomputing first if a dependency changed.
    pub fn get(&self) -> Result<Value, ReactiveError> {
        if self.computation.is_dirty() {
            self.computation.evaluate()?;
        }
        if self.computation.runtime().is_tracking() {
            self.computation.depend();
        }
        Ok(self.computation.value())
    }

    /// Assign through the setter. The cached value is left alone; it
    /// follows once the setter's writes mark it dirty.
    ///
    /// A read-only computed value ignores the write and warns in debug mode.
    pub fn set(&self, value: impl Into<Value>) {
        let Some(setter) = &self.setter else {
            self.computation
                .runtime()
                .warn(Warning::ReadOnlyComputed, Some(self.computation.owner_id()));
            return;
        };
        if let Some(scope) = self.computation.owner() {
            setter(&scope, value.into());
        }
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.computation.is_dirty()
    }

    pub fn computation(&self) -> &Computation {
        &self.computation
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("computation", &self.computation)
            .field("writable", &self.is_writable())
            .finish()
    }
}
