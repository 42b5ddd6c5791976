//! Scopes
//!
//! A [`Scope`] owns a root state object and the computations installed into
//! it: its render job, computed values and watchers. It is the stand-in for
//! a component instance and carries the lifecycle bits the scheduler needs:
//!
//! - `mounted`, `destroyed` and `inactive` flags,
//! - before-update, updated and activated hooks.
//!
//! Disposing a scope tears down everything it owns. Dropping the last
//! handle disposes it too.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use super::computation::{
    Callback, Computation, ComputationId, ComputationOptions, Getter, Hook,
};
use super::computed::{Computed, Setter};
use super::object::Object;
use super::observer::DefineOptions;
use super::runtime::Runtime;
use super::value::Value;
use crate::error::{BoxError, ReactiveError, Warning};

/// Unique identifier for a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Options for [`Scope::watch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Also fire for nested mutations.
    pub deep: bool,

    /// Call the callback once right away with `(value, null)`.
    pub immediate: bool,

    /// Run on notification instead of waiting for the next flush.
    pub sync: bool,
}

#[derive(Default)]
struct Hooks {
    before_update: Vec<Hook>,
    updated: Vec<Hook>,
    activated: Vec<Hook>,
}

#[derive(Clone, Copy)]
enum HookKind {
    BeforeUpdate,
    Updated,
    Activated,
}

/// Owner of state and computations.
#[derive(Clone)]
pub struct Scope(Rc<ScopeInner>);

pub(crate) struct ScopeInner {
    id: ScopeId,
    runtime: Runtime,
    data: Object,
    computations: RefCell<Vec<Computation>>,
    render: RefCell<Option<Computation>>,
    hooks: RefCell<Hooks>,
    updating_props: Rc<Cell<bool>>,
    mounted: Cell<bool>,
    being_destroyed: Cell<bool>,
    destroyed: Cell<bool>,
    inactive: Cell<bool>,
}

#[derive(Clone)]
pub(crate) struct WeakScope(Weak<ScopeInner>);

impl WeakScope {
    pub(crate) fn upgrade(&self) -> Option<Scope> {
        self.0.upgrade().map(Scope)
    }
}

impl Scope {
    pub(crate) fn new(runtime: &Runtime, data: Object) -> Self {
        let id = ScopeId::next();
        tracing::debug!(scope = id.raw(), "creating scope");

        Self(Rc::new(ScopeInner {
            id,
            runtime: runtime.clone(),
            data,
            computations: RefCell::new(Vec::new()),
            render: RefCell::new(None),
            hooks: RefCell::new(Hooks::default()),
            updating_props: Rc::new(Cell::new(false)),
            mounted: Cell::new(false),
            being_destroyed: Cell::new(false),
            destroyed: Cell::new(false),
            inactive: Cell::new(false),
        }))
    }

    pub fn id(&self) -> ScopeId {
        self.0.id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.0.runtime
    }

    /// The root state object.
    pub fn data(&self) -> Object {
        self.0.data.clone()
    }

    /// Create a lazily evaluated, cached value.
    pub fn computed<F>(&self, getter: F) -> Result<Computed, ReactiveError>
    where
        F: Fn(&Scope) -> Result<Value, BoxError> + 'static,
    {
        self.lazy_computed(Getter::function(getter), None)
    }

    /// Create a computed value that can also be assigned. Assignments call
    /// `setter` with this scope.
    pub fn computed_with_setter<F, S>(
        &self,
        getter: F,
        setter: S,
    ) -> Result<Computed, ReactiveError>
    where
        F: Fn(&Scope) -> Result<Value, BoxError> + 'static,
        S: Fn(&Scope, Value) + 'static,
    {
        let setter: Setter = Rc::new(setter);
        self.lazy_computed(Getter::function(getter), Some(setter))
    }

    fn lazy_computed(
        &self,
        getter: Getter,
        setter: Option<Setter>,
    ) -> Result<Computed, ReactiveError> {
        let computation = Computation::new(
            self,
            getter,
            None,
            ComputationOptions {
                lazy: true,
                ..Default::default()
            },
        )?;
        Ok(Computed::new(computation, setter))
    }

    /// Watch a path or closure, calling `callback(new, old)` on change.
    ///
    /// Errors raised by the getter or the callback are reported, not
    /// returned.
    pub fn watch<C>(
        &self,
        getter: impl Into<Getter>,
        callback: C,
        options: WatchOptions,
    ) -> Result<WatchHandle, ReactiveError>
    where
        C: Fn(&Value, &Value) -> Result<(), BoxError> + 'static,
    {
        let callback = Callback::new(callback);
        let computation = Computation::new(
            self,
            getter,
            Some(callback.clone()),
            ComputationOptions {
                deep: options.deep,
                sync: options.sync,
                user: true,
                ..Default::default()
            },
        )?;

        if options.immediate {
            let value = computation.value();
            let result = self
                .runtime()
                .untracked(|| callback.call(&value, &Value::Null));
            if let Err(source) = result {
                let error = ReactiveError::Callback {
                    info: format!(
                        "callback for immediate watcher \"{}\"",
                        computation.expression()
                    ),
                    source,
                };
                self.runtime().report_error(&error, Some(self.id()));
            }
        }

        Ok(WatchHandle { computation })
    }

    /// [`watch`](Self::watch) with a closure getter.
    pub fn watch_fn<F, C>(
        &self,
        getter: F,
        callback: C,
        options: WatchOptions,
    ) -> Result<WatchHandle, ReactiveError>
    where
        F: Fn(&Scope) -> Result<Value, BoxError> + 'static,
        C: Fn(&Value, &Value) -> Result<(), BoxError> + 'static,
    {
        self.watch(Getter::function(getter), callback, options)
    }

    /// Install the render job and mark the scope mounted.
    ///
    /// The render job is queued like any other computation. Before each
    /// re-run the before-update hooks fire; after the flush the updated
    /// hooks do.
    pub fn mount<F>(&self, render: F) -> Result<Computation, ReactiveError>
    where
        F: Fn(&Scope) -> Result<Value, BoxError> + 'static,
    {
        let owner = self.downgrade();
        let before: Hook = Rc::new(move || {
            if let Some(scope) = owner.upgrade() {
                if scope.is_mounted() && !scope.is_destroyed() {
                    scope.call_hooks(HookKind::BeforeUpdate);
                }
            }
        });

        let computation = Computation::new(
            self,
            Getter::function(render),
            None,
            ComputationOptions {
                render: true,
                before: Some(before),
                label: Some("render".to_string()),
                ..Default::default()
            },
        )?;

        self.0.mounted.set(true);
        Ok(computation)
    }

    /// Declare a property fed from outside. Writing it directly warns in
    /// debug mode; use [`update_prop`](Self::update_prop) instead.
    ///
    /// The property itself is reactive, but its value is not observed: a
    /// container passed in is owned by whoever passed it and is only
    /// reactive if they made it so.
    pub fn define_prop(&self, key: &str, value: impl Into<Value>) {
        let runtime = self.runtime().clone();
        let owner = self.id();
        let updating = self.0.updating_props.clone();
        let name = key.to_string();

        let custom_setter: Rc<dyn Fn()> = Rc::new(move || {
            if !updating.get() {
                runtime.warn(Warning::PropMutation { key: name.clone() }, Some(owner));
            }
        });

        let value = value.into();
        self.runtime().without_observing(|| {
            self.runtime().define_reactive_with(
                &self.0.data,
                key,
                value,
                DefineOptions {
                    shallow: false,
                    custom_setter: Some(custom_setter),
                },
            )
        });
    }

    /// Assign a property declared with [`define_prop`](Self::define_prop).
    pub fn update_prop(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        self.0.updating_props.set(true);
        self.runtime()
            .without_observing(|| self.0.data.insert(key, value));
        self.0.updating_props.set(false);
    }

    pub fn on_before_update(&self, hook: impl Fn() + 'static) {
        self.0.hooks.borrow_mut().before_update.push(Rc::new(hook));
    }

    pub fn on_updated(&self, hook: impl Fn() + 'static) {
        self.0.hooks.borrow_mut().updated.push(Rc::new(hook));
    }

    pub fn on_activated(&self, hook: impl Fn() + 'static) {
        self.0.hooks.borrow_mut().activated.push(Rc::new(hook));
    }

    pub fn is_mounted(&self) -> bool {
        self.0.mounted.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.get()
    }

    pub fn is_inactive(&self) -> bool {
        self.0.inactive.get()
    }

    /// Mark the scope as kept alive but hidden. It becomes active again
    /// through [`Runtime::queue_activated`].
    pub fn deactivate(&self) {
        self.set_inactive(true);
    }

    /// Computations currently owned, in creation order.
    pub fn computations(&self) -> Vec<Computation> {
        self.0.computations.borrow().clone()
    }

    pub fn render_computation(&self) -> Option<Computation> {
        self.0.render.borrow().clone()
    }

    /// Tear down every owned computation and release the root state.
    pub fn dispose(&self) {
        self.0.dispose();
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakScope {
        WeakScope(Rc::downgrade(&self.0))
    }

    pub(crate) fn register(&self, computation: &Computation) {
        self.0.computations.borrow_mut().push(computation.clone());
    }

    pub(crate) fn forget(&self, id: ComputationId) {
        self.0.computations.borrow_mut().retain(|c| c.id() != id);

        let mut render = self.0.render.borrow_mut();
        if render.as_ref().is_some_and(|c| c.id() == id) {
            *render = None;
        }
    }

    pub(crate) fn set_render(&self, computation: &Computation) {
        *self.0.render.borrow_mut() = Some(computation.clone());
    }

    pub(crate) fn is_being_destroyed(&self) -> bool {
        self.0.being_destroyed.get()
    }

    /// Fire the updated hooks after `computation` ran, if it is this
    /// scope's render job.
    pub(crate) fn call_updated(&self, computation: &Computation) {
        let is_render = self
            .0
            .render
            .borrow()
            .as_ref()
            .is_some_and(|render| render.ptr_eq(computation));

        if is_render && self.is_mounted() && !self.is_destroyed() {
            self.call_hooks(HookKind::Updated);
        }
    }

    pub(crate) fn set_inactive(&self, inactive: bool) {
        self.0.inactive.set(inactive);
    }

    pub(crate) fn activate(&self) {
        self.set_inactive(false);
        self.call_hooks(HookKind::Activated);
    }

    fn call_hooks(&self, kind: HookKind) {
        let hooks: Vec<Hook> = {
            let hooks = self.0.hooks.borrow();
            match kind {
                HookKind::BeforeUpdate => hooks.before_update.clone(),
                HookKind::Updated => hooks.updated.clone(),
                HookKind::Activated => hooks.activated.clone(),
            }
        };

        self.runtime().untracked(|| {
            for hook in &hooks {
                hook();
            }
        });
    }
}

impl ScopeInner {
    fn dispose(&self) {
        if self.being_destroyed.replace(true) {
            return;
        }
        tracing::debug!(scope = self.id.raw(), "disposing scope");

        let computations = std::mem::take(&mut *self.computations.borrow_mut());
        for computation in computations.iter().rev() {
            computation.teardown();
        }
        self.render.borrow_mut().take();

        if let Some(observer) = self.data.observer() {
            observer.release_root();
        }
        self.destroyed.set(true);
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.0.id)
            .field("computations", &self.0.computations.borrow().len())
            .field("mounted", &self.is_mounted())
            .field("destroyed", &self.is_destroyed())
            .field("inactive", &self.is_inactive())
            .finish()
    }
}

/// Handle returned by [`Scope::watch`].
#[derive(Debug, Clone)]
pub struct WatchHandle {
    computation: Computation,
}

impl WatchHandle {
    /// Stop watching.
    pub fn unwatch(&self) {
        self.computation.teardown();
    }

    /// The watched value as of the last run.
    pub fn value(&self) -> Value {
        self.computation.value()
    }

    pub fn computation(&self) -> &Computation {
        &self.computation
    }
}
