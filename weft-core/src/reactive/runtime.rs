//! Reactive Runtime
//!
//! The runtime is the central coordinator that ties state, computations and
//! the scheduler together. Everything that the reactive core treats as
//! process-wide lives here instead of in globals:
//!
//! - the evaluation context stack,
//! - the flush queue and the tick queue,
//! - the observing switch,
//! - the configuration and the error reporter.
//!
//! # How It Works
//!
//! 1. State passed to [`Runtime::scope`] is observed: each property becomes
//!    a reactive slot with its own dependency node.
//!
//! 2. When a computation evaluates, it is pushed on the context stack, and
//!    every reactive read subscribes it to the slot that was read.
//!
//! 3. When a slot changes, its subscribers are notified:
//!    a. lazy computations are marked dirty,
//!    b. sync computations run at once,
//!    c. everything else is queued and flushed once per tick.
//!
//! # Threading
//!
//! A runtime is single-threaded. Handles are cheap `Rc` clones and must stay
//! on the thread that created them.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::computation::Computation;
use super::context::{ContextGuard, ContextStack};
use super::scope::{Scope, ScopeId};
use super::value::Value;
use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Reporter, TracingReporter, Warning};
use crate::scheduler::{FlushQueue, TickQueue};

/// Handle to a reactive runtime.
#[derive(Clone)]
pub struct Runtime(pub(crate) Rc<RuntimeInner>);

pub(crate) struct RuntimeInner {
    pub(crate) config: Cell<RuntimeConfig>,
    pub(crate) reporter: RefCell<Rc<dyn Reporter>>,
    pub(crate) observing: Cell<bool>,
    pub(crate) context: ContextStack,
    pub(crate) queue: RefCell<FlushQueue>,
    pub(crate) ticks: TickQueue,
}

/// Weak handle to a runtime, held by deferred jobs.
#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(Runtime)
    }
}

impl Runtime {
    /// Create a runtime with the given configuration.
    pub fn new(config: RuntimeConfig) -> Self {
        tracing::debug!(?config, "creating reactive runtime");

        Self(Rc::new(RuntimeInner {
            config: Cell::new(config),
            reporter: RefCell::new(Rc::new(TracingReporter)),
            observing: Cell::new(true),
            context: ContextStack::default(),
            queue: RefCell::new(FlushQueue::default()),
            ticks: TickQueue::default(),
        }))
    }

    pub fn config(&self) -> RuntimeConfig {
        self.0.config.get()
    }

    pub fn set_config(&self, config: RuntimeConfig) {
        self.0.config.set(config);
    }

    /// Replace the error and warning channel.
    pub fn set_reporter(&self, reporter: impl Reporter + 'static) {
        *self.0.reporter.borrow_mut() = Rc::new(reporter);
    }

    /// Emit a warning. Dropped unless the runtime is in debug mode and not
    /// silenced.
    pub fn warn(&self, warning: Warning, owner: Option<ScopeId>) {
        let config = self.config();
        if !config.debug || config.silent {
            return;
        }

        // The reporter may call back into the runtime.
        let reporter = self.0.reporter.borrow().clone();
        reporter.warn(&warning, owner);
    }

    pub(crate) fn report_error(&self, error: &ReactiveError, owner: Option<ScopeId>) {
        let reporter = self.0.reporter.borrow().clone();
        reporter.error(error, owner);
    }

    /// The computation currently evaluating, if tracking is enabled.
    pub fn current_target(&self) -> Option<Computation> {
        self.0.context.current()
    }

    /// Whether reactive reads are currently being recorded.
    pub fn is_tracking(&self) -> bool {
        self.current_target().is_some()
    }

    /// Run `f` without recording any reactive reads.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.push_target(None);
        f()
    }

    /// Create a scope owning `data` as its root state.
    ///
    /// Non-object state is replaced with an empty object.
    pub fn scope(&self, data: Value) -> Scope {
        let data = match data {
            Value::Object(object) => object,
            _ => {
                self.warn(Warning::NonObjectState, None);
                Default::default()
            }
        };

        let scope = Scope::new(self, data);
        self.observe_root(&Value::Object(scope.data()));
        scope
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn context(&self) -> &ContextStack {
        &self.0.context
    }

    pub(crate) fn push_target(&self, target: Option<Computation>) -> ContextGuard {
        ContextGuard::enter(self, target)
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Rc::downgrade(&self.0))
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config())
            .field("observing", &self.is_observing())
            .field("tracking", &self.is_tracking())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecordingReporter;
    use crate::reactive::{Object, WatchOptions};

    fn debug_config() -> RuntimeConfig {
        RuntimeConfig {
            debug: true,
            ..RuntimeConfig::default()
        }
    }

    #[test]
    fn warnings_respect_debug_and_silent() {
        let runtime = Runtime::new(debug_config());
        let reporter = RecordingReporter::new();
        runtime.set_reporter(reporter.clone());

        runtime.warn(Warning::NonObjectState, None);
        runtime.set_config(RuntimeConfig {
            silent: true,
            ..debug_config()
        });
        runtime.warn(Warning::NonObjectState, None);
        runtime.set_config(RuntimeConfig {
            debug: false,
            ..RuntimeConfig::default()
        });
        runtime.warn(Warning::NonObjectState, None);

        assert_eq!(reporter.warnings(), vec![Warning::NonObjectState]);
    }

    #[test]
    fn errors_are_always_reported() {
        let runtime = Runtime::new(RuntimeConfig {
            debug: false,
            silent: true,
            ..RuntimeConfig::default()
        });
        let reporter = RecordingReporter::new();
        runtime.set_reporter(reporter.clone());

        runtime.report_error(
            &ReactiveError::Evaluation {
                info: "render".to_string(),
                source: "boom".into(),
            },
            None,
        );
        assert_eq!(reporter.errors(), vec!["error in render: boom".to_string()]);
    }

    #[test]
    fn scope_observes_its_state_as_root() {
        let runtime = Runtime::default();
        let scope = runtime.scope(Value::from_json(serde_json::json!({ "a": 1 })));

        let observer = Value::Object(scope.data()).observer().unwrap();
        assert_eq!(observer.root_count(), 1);
        assert!(scope.data().is_reactive("a"));
    }

    #[test]
    fn non_object_state_is_replaced() {
        let runtime = Runtime::new(debug_config());
        let reporter = RecordingReporter::new();
        runtime.set_reporter(reporter.clone());

        let scope = runtime.scope(Value::from(3));
        assert!(scope.data().is_empty());
        assert_eq!(reporter.warnings(), vec![Warning::NonObjectState]);
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let runtime = Runtime::new(RuntimeConfig::sync());
        let scope = runtime.scope(Value::from_json(serde_json::json!({ "a": 1, "b": 2 })));
        let data = scope.data();

        let inner = data.clone();
        let rt = runtime.clone();
        let handle = scope
            .watch_fn(
                move |_| {
                    let a = inner.get("a").unwrap_or_default();
                    rt.untracked(|| inner.get("b"));
                    Ok(a)
                },
                |_, _| Ok(()),
                WatchOptions::default(),
            )
            .unwrap();

        let computation = handle.computation();
        assert!(computation.depends_on(&data.property_dep("a").unwrap()));
        assert!(!computation.depends_on(&data.property_dep("b").unwrap()));
    }

    #[test]
    fn runtimes_are_independent() {
        let first = Runtime::default();
        let second = Runtime::default();
        assert!(!first.ptr_eq(&second));
        assert!(first.ptr_eq(&first.clone()));

        let object = Object::new();
        second.without_observing(|| {
            assert!(first.observe(&Value::from(object.clone())).is_some());
        });
    }
}
