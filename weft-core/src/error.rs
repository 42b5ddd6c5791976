//! Error Reporting
//!
//! Failures inside the reactive core fall into three groups:
//!
//! - Evaluation errors raised by a computation's getter or change callback.
//!   User computations report them and keep going; internal ones (render
//!   jobs, computed getters) hand them back to the caller.
//! - Validation warnings. They never interrupt execution and are only
//!   emitted when the runtime runs in debug mode.
//! - The infinite-update-loop guard, which aborts the current flush pass.
//!
//! Everything is routed through a single [`Reporter`] owned by the runtime.

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

use crate::reactive::ScopeId;

/// Boxed error returned by user-supplied getters and callbacks.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// An error raised while evaluating a computation.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// The getter of a computation failed.
    #[error("error in {info}: {source}")]
    Evaluation {
        info: String,
        #[source]
        source: BoxError,
    },

    /// The change callback of a computation failed.
    #[error("error in {info}: {source}")]
    Callback {
        info: String,
        #[source]
        source: BoxError,
    },
}

impl ReactiveError {
    /// Context string describing where the error happened.
    pub fn info(&self) -> &str {
        match self {
            Self::Evaluation { info, .. } | Self::Callback { info, .. } => info,
        }
    }
}

/// Advisory conditions reported through the warning channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    #[error("cannot set or delete a reactive property on a null or primitive value")]
    PrimitiveTarget,

    #[error(
        "avoid adding or deleting reactive property `{key}` on root state at runtime, \
         declare it upfront instead"
    )]
    RootStateMutation { key: String },

    #[error("avoid adding or deleting property `{key}` on a live instance")]
    InstanceMutation { key: String },

    #[error("property `{key}` is not configurable and will not be reactive")]
    NonConfigurable { key: String },

    #[error("`{key}` is not a valid array index")]
    InvalidArrayKey { key: String },

    #[error(
        "failed watching path `{path}`: only simple dot-delimited paths are accepted, \
         use a function instead"
    )]
    InvalidPath { path: String },

    #[error("you may have an infinite update loop {location}")]
    InfiniteUpdateLoop { location: String },

    #[error("avoid mutating prop `{key}` directly, it is overwritten on the next update")]
    PropMutation { key: String },

    #[error("scope state must be an object")]
    NonObjectState,

    #[error("computed value was assigned to but it has no setter")]
    ReadOnlyComputed,
}

/// The centralized channel for errors and warnings.
pub trait Reporter {
    /// Report an evaluation error.
    fn error(&self, error: &ReactiveError, owner: Option<ScopeId>);

    /// Report a validation warning.
    fn warn(&self, warning: &Warning, owner: Option<ScopeId>);
}

/// Default reporter: forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn error(&self, error: &ReactiveError, owner: Option<ScopeId>) {
        tracing::error!(owner = ?owner, info = error.info(), "{error}");
    }

    fn warn(&self, warning: &Warning, owner: Option<ScopeId>) {
        tracing::warn!(owner = ?owner, "{warning}");
    }
}

/// A reporter that keeps everything it receives.
///
/// Clones share the same log, so one handle can be installed on a runtime
/// while another is inspected.
#[derive(Debug, Default, Clone)]
pub struct RecordingReporter {
    errors: Rc<RefCell<Vec<String>>>,
    warnings: Rc<RefCell<Vec<Warning>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered messages of every error reported so far.
    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }

    /// Every warning reported so far.
    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.borrow().clone()
    }
}

impl Reporter for RecordingReporter {
    fn error(&self, error: &ReactiveError, _owner: Option<ScopeId>) {
        self.errors.borrow_mut().push(error.to_string());
    }

    fn warn(&self, warning: &Warning, _owner: Option<ScopeId>) {
        self.warnings.borrow_mut().push(warning.clone());
    }
}
