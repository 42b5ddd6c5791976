//! Computation Implementation
//!
//! A Computation is a re-runnable unit of work: a render job, a computed
//! getter, or a user watch expression. It records the dependency nodes it
//! reads on every evaluation and keeps its subscriptions equal to that set.
//!
//! # How Computations Work
//!
//! 1. When created, a computation evaluates once (unless it is lazy) to
//!    establish its initial dependencies.
//!
//! 2. During evaluation it sits on top of the runtime's context stack, so
//!    every reactive read lands in `new_deps`.
//!
//! 3. After evaluation, deps that were not read again are unsubscribed and
//!    `new_deps` becomes `deps`.
//!
//! 4. When a dep notifies, [`Computation::update`] decides what happens:
//!    - lazy computations are only marked dirty,
//!    - sync computations run immediately,
//!    - everything else is queued for the next flush.
//!
//! # Lifecycle
//!
//! ```text
//! lazy-uninitialized -> clean -> dirty -> running -> clean -> torn down
//! ```
//!
//! Teardown is final: an inactive computation never runs again and holds no
//! subscriptions.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::dep::{Dep, DepId};
use super::runtime::Runtime;
use super::scope::{Scope, ScopeId, WeakScope};
use super::traverse::traverse;
use super::value::{same_value, Value};
use crate::error::{BoxError, ReactiveError, Warning};

/// Unique identifier for a computation.
///
/// Ids increase monotonically. A computation created later always has a
/// larger id, which the scheduler relies on: parents run before children
/// and user watchers run before the render job of the same scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputationId(u64);

impl ComputationId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The body of a computation.
#[derive(Clone)]
pub enum Getter {
    /// A closure evaluated against the owning scope.
    Function(Rc<dyn Fn(&Scope) -> Result<Value, BoxError>>),

    /// A dot-delimited path into the owner's state, e.g. `user.tags.0`.
    Path(String),
}

impl Getter {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Scope) -> Result<Value, BoxError> + 'static,
    {
        Self::Function(Rc::new(f))
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }
}

impl From<&str> for Getter {
    fn from(path: &str) -> Self {
        Self::path(path)
    }
}

impl From<String> for Getter {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl fmt::Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(_) => f.write_str("Getter::Function(..)"),
            Self::Path(path) => write!(f, "Getter::Path({path:?})"),
        }
    }
}

/// Change callback, called with `(new, old)`.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&Value, &Value) -> Result<(), BoxError>>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<(), BoxError> + 'static,
    {
        Self(Rc::new(f))
    }

    pub(crate) fn call(&self, new: &Value, old: &Value) -> Result<(), BoxError> {
        (self.0)(new, old)
    }
}

/// Lifecycle hook.
pub type Hook = Rc<dyn Fn()>;

/// Construction options for a [`Computation`].
#[derive(Clone, Default)]
pub struct ComputationOptions {
    /// Touch every nested value after evaluation.
    pub deep: bool,

    /// Created by user code: errors are reported instead of returned.
    pub user: bool,

    /// Do not evaluate until asked; notifications only mark it dirty.
    pub lazy: bool,

    /// Run immediately on notification instead of being queued.
    pub sync: bool,

    /// The owner's render job.
    pub render: bool,

    /// Called by the scheduler right before the computation runs.
    pub before: Option<Hook>,

    /// Human-readable name used in diagnostics for closure getters.
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Flags {
    deep: bool,
    user: bool,
    lazy: bool,
    sync: bool,
    render: bool,
}

enum Body {
    Function(Rc<dyn Fn(&Scope) -> Result<Value, BoxError>>),
    Path(Vec<String>),
    Invalid,
}

#[derive(Default)]
struct Tracking {
    deps: IndexMap<DepId, Dep>,
    new_deps: IndexMap<DepId, Dep>,
}

/// A tracked, re-runnable unit of work.
#[derive(Clone)]
pub struct Computation(Rc<ComputationInner>);

struct ComputationInner {
    id: ComputationId,
    runtime: Runtime,
    owner: WeakScope,
    owner_id: ScopeId,
    expression: String,
    body: Body,
    callback: Option<Callback>,
    before: Option<Hook>,
    flags: Flags,
    tracking: RefCell<Tracking>,
    value: RefCell<Value>,
    dirty: Cell<bool>,
    active: Cell<bool>,
}

/// Non-owning handle, held by dependency nodes.
#[derive(Clone)]
pub(crate) struct WeakComputation(Weak<ComputationInner>);

impl WeakComputation {
    pub(crate) fn upgrade(&self) -> Option<Computation> {
        self.0.upgrade().map(Computation)
    }
}

impl Computation {
    /// Create a computation owned by `owner`.
    ///
    /// Non-lazy computations evaluate immediately. If that first evaluation
    /// fails for an internal computation, the computation is torn down and
    /// the error returned.
    pub fn new(
        owner: &Scope,
        getter: impl Into<Getter>,
        callback: Option<Callback>,
        options: ComputationOptions,
    ) -> Result<Self, ReactiveError> {
        let runtime = owner.runtime().clone();

        let (expression, body) = match getter.into() {
            Getter::Function(f) => (
                options.label.clone().unwrap_or_else(|| "function".to_string()),
                Body::Function(f),
            ),
            Getter::Path(path) => match parse_path(&path) {
                Some(segments) => (path, Body::Path(segments)),
                None => {
                    runtime.warn(Warning::InvalidPath { path: path.clone() }, Some(owner.id()));
                    (path, Body::Invalid)
                }
            },
        };

        let computation = Self(Rc::new(ComputationInner {
            id: ComputationId::next(),
            runtime,
            owner: owner.downgrade(),
            owner_id: owner.id(),
            expression,
            body,
            callback,
            before: options.before,
            flags: Flags {
                deep: options.deep,
                user: options.user,
                lazy: options.lazy,
                sync: options.sync,
                render: options.render,
            },
            tracking: RefCell::new(Tracking::default()),
            value: RefCell::new(Value::Null),
            dirty: Cell::new(options.lazy),
            active: Cell::new(true),
        }));

        owner.register(&computation);
        if options.render {
            owner.set_render(&computation);
        }

        if !options.lazy {
            match computation.get() {
                Ok(value) => *computation.0.value.borrow_mut() = value,
                Err(error) => {
                    computation.teardown();
                    return Err(error);
                }
            }
        }

        tracing::trace!(
            id = computation.id().raw(),
            expression = %computation.0.expression,
            "computation created"
        );
        Ok(computation)
    }

    pub fn id(&self) -> ComputationId {
        self.0.id
    }

    /// Evaluate the getter and re-collect dependencies.
    pub fn get(&self) -> Result<Value, ReactiveError> {
        let result = {
            let _guard = self.0.runtime.push_target(Some(self.clone()));
            let result = self.invoke();
            if self.0.flags.deep {
                if let Ok(value) = &result {
                    traverse(value);
                }
            }
            result
        };
        self.cleanup_deps();

        match result {
            Ok(value) => Ok(value),
            Err(source) => {
                let error = ReactiveError::Evaluation {
                    info: self.getter_info(),
                    source,
                };
                if self.0.flags.user {
                    self.0.runtime.report_error(&error, Some(self.0.owner_id));
                    Ok(Value::Null)
                } else {
                    Err(error)
                }
            }
        }
    }

    fn invoke(&self) -> Result<Value, BoxError> {
        let Some(owner) = self.owner() else {
            return Ok(Value::Null);
        };

        match &self.0.body {
            Body::Function(f) => f(&owner),
            Body::Path(segments) => Ok(resolve_path(&Value::Object(owner.data()), segments)),
            Body::Invalid => Ok(Value::Null),
        }
    }

    /// Record a read of `dep` during the current evaluation.
    pub(crate) fn add_dep(&self, dep: &Dep) {
        let id = dep.id();
        let subscribe = {
            let mut tracking = self.0.tracking.borrow_mut();
            if tracking.new_deps.contains_key(&id) {
                return;
            }
            tracking.new_deps.insert(id, dep.clone());
            !tracking.deps.contains_key(&id)
        };

        if subscribe {
            dep.add_subscriber(self);
        }
    }

    /// Swap in the freshly collected deps, unsubscribing from the stale ones.
    fn cleanup_deps(&self) {
        let active = self.0.active.get();
        let stale = {
            let mut tracking = self.0.tracking.borrow_mut();
            let Tracking { deps, new_deps } = &mut *tracking;

            let stale: SmallVec<[Dep; 8]> = if active {
                deps.values()
                    .filter(|dep| !new_deps.contains_key(&dep.id()))
                    .cloned()
                    .collect()
            } else {
                // Torn down while evaluating.
                deps.drain(..).chain(new_deps.drain(..)).map(|(_, dep)| dep).collect()
            };

            std::mem::swap(deps, new_deps);
            new_deps.clear();
            stale
        };

        for dep in stale {
            dep.remove_subscriber(self.id());
        }
    }

    /// React to a change in one of the dependencies.
    pub fn update(&self) {
        if self.0.flags.lazy {
            self.0.dirty.set(true);
        } else if self.0.flags.sync {
            if let Err(error) = self.run() {
                self.0.runtime.report_error(&error, Some(self.0.owner_id));
            }
        } else {
            self.0.runtime.queue_computation(self.clone());
        }
    }

    /// Re-evaluate and fire the callback if the value changed.
    ///
    /// Containers always count as changed since they may have been mutated
    /// in place.
    pub fn run(&self) -> Result<(), ReactiveError> {
        if !self.0.active.get() {
            return Ok(());
        }

        let value = self.get()?;
        let changed = !same_value(&self.0.value.borrow(), &value);
        if !(changed || value.is_object() || self.0.flags.deep) {
            return Ok(());
        }

        let old = self.0.value.replace(value.clone());
        let Some(callback) = &self.0.callback else {
            return Ok(());
        };

        if let Err(source) = callback.call(&value, &old) {
            let error = ReactiveError::Callback {
                info: format!("callback for watcher \"{}\"", self.0.expression),
                source,
            };
            if self.0.flags.user {
                self.0.runtime.report_error(&error, Some(self.0.owner_id));
            } else {
                return Err(error);
            }
        }
        Ok(())
    }

    /// Recompute a lazy computation and mark it clean.
    pub fn evaluate(&self) -> Result<(), ReactiveError> {
        let value = self.get()?;
        *self.0.value.borrow_mut() = value;
        self.0.dirty.set(false);
        Ok(())
    }

    /// Subscribe the evaluating computation to everything this one depends
    /// on.
    pub fn depend(&self) {
        let deps: SmallVec<[Dep; 8]> = self.0.tracking.borrow().deps.values().cloned().collect();
        for dep in deps {
            dep.depend();
        }
    }

    /// Unsubscribe from all deps and leave the owner. Idempotent.
    pub fn teardown(&self) {
        if !self.0.active.replace(false) {
            return;
        }

        if let Some(owner) = self.owner() {
            if !owner.is_being_destroyed() {
                owner.forget(self.id());
            }
        }

        let deps: SmallVec<[Dep; 8]> = {
            let mut tracking = self.0.tracking.borrow_mut();
            tracking.new_deps.clear();
            tracking.deps.drain(..).map(|(_, dep)| dep).collect()
        };
        for dep in deps {
            dep.remove_subscriber(self.id());
        }

        tracing::trace!(id = self.id().raw(), "computation torn down");
    }

    /// The last computed value.
    pub fn value(&self) -> Value {
        self.0.value.borrow().clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    pub fn is_lazy(&self) -> bool {
        self.0.flags.lazy
    }

    pub fn is_user(&self) -> bool {
        self.0.flags.user
    }

    pub fn is_deep(&self) -> bool {
        self.0.flags.deep
    }

    pub fn is_sync(&self) -> bool {
        self.0.flags.sync
    }

    pub fn is_render(&self) -> bool {
        self.0.flags.render
    }

    /// The watched path, or the label of a closure getter.
    pub fn expression(&self) -> &str {
        &self.0.expression
    }

    pub fn dependency_count(&self) -> usize {
        self.0.tracking.borrow().deps.len()
    }

    pub fn depends_on(&self, dep: &Dep) -> bool {
        self.0.tracking.borrow().deps.contains_key(&dep.id())
    }

    pub fn owner(&self) -> Option<Scope> {
        self.0.owner.upgrade()
    }

    pub fn owner_id(&self) -> ScopeId {
        self.0.owner_id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.0.runtime
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakComputation {
        WeakComputation(Rc::downgrade(&self.0))
    }

    pub(crate) fn run_before(&self) {
        if let Some(before) = &self.0.before {
            before();
        }
    }

    fn getter_info(&self) -> String {
        let flags = self.0.flags;
        if flags.render {
            "render".to_string()
        } else if flags.lazy {
            format!("computed getter \"{}\"", self.0.expression)
        } else {
            format!("getter for watcher \"{}\"", self.0.expression)
        }
    }
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.0.id)
            .field("expression", &self.0.expression)
            .field("flags", &self.0.flags)
            .field("active", &self.is_active())
            .field("dirty", &self.is_dirty())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Split a watch path into segments. `None` if it contains anything but
/// word characters, `.` and `$`.
fn parse_path(path: &str) -> Option<Vec<String>> {
    let valid = path
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '$');
    valid.then(|| path.split('.').map(str::to_string).collect())
}

fn resolve_path(root: &Value, segments: &[String]) -> Value {
    let mut current = root.clone();
    for segment in segments {
        current = match &current {
            Value::Object(object) => object.get(segment).unwrap_or_default(),
            Value::Array(array) => segment
                .parse()
                .ok()
                .and_then(|index| array.get(index))
                .unwrap_or_default(),
            _ => return Value::Null,
        };
    }
    current
}
