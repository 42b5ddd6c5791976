//! Evaluation Context
//!
//! The evaluation context tracks which computation is currently running, so
//! that a property read can attribute itself to the right subscriber.
//!
//! # Implementation
//!
//! Each runtime owns one stack. Entering a computation pushes it; the
//! returned [`ContextGuard`] pops it when dropped, which also happens when
//! the computation's body panics. Nested evaluation (a render job reading a
//! computed value that has to recompute) pushes on top and restores the
//! previous entry on exit.
//!
//! An empty entry (`None`) disables tracking for the code running on top of
//! it, e.g. lifecycle hooks.

use std::cell::RefCell;

use super::computation::{Computation, ComputationId};
use super::runtime::Runtime;

/// The stack of computations being evaluated.
#[derive(Default)]
pub(crate) struct ContextStack {
    entries: RefCell<Vec<Option<Computation>>>,
}

impl ContextStack {
    fn push(&self, entry: Option<Computation>) {
        self.entries.borrow_mut().push(entry);
    }

    fn pop(&self) -> Option<Option<Computation>> {
        self.entries.borrow_mut().pop()
    }

    /// The computation on top of the stack, if tracking is enabled there.
    pub(crate) fn current(&self) -> Option<Computation> {
        self.entries.borrow().last().cloned().flatten()
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// Guard that pops the context when dropped.
pub(crate) struct ContextGuard {
    runtime: Runtime,
    expected: Option<ComputationId>,
}

impl ContextGuard {
    pub(crate) fn enter(runtime: &Runtime, entry: Option<Computation>) -> Self {
        let expected = entry.as_ref().map(Computation::id);
        runtime.context().push(entry);
        Self {
            runtime: runtime.clone(),
            expected,
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let popped = self.runtime.context().pop();

        // Catch mismatched enter/exit pairs.
        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.as_ref().map(Computation::id),
                self.expected,
                "evaluation context mismatch"
            );
        }
    }
}
