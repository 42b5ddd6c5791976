//! Flush Queue
//!
//! # Algorithm
//!
//! 1. `queue_computation` adds a computation unless it is already pending.
//!    The first addition of a cycle schedules a flush on the tick queue (or
//!    flushes immediately in sync mode).
//!
//! 2. The flush sorts the queue by id and walks it. For each entry:
//!    - run its `before` hook,
//!    - clear its pending mark, so it can be queued again by what follows,
//!    - run it.
//!
//! 3. In debug mode, an entry that keeps re-queueing itself is counted. Once
//!    the count passes `max_update_count` the pass is aborted with a
//!    warning.
//!
//! 4. After the pass, activated scopes get their activated hooks and scopes
//!    whose render job ran get their updated hooks, both in reverse queue
//!    order.
//!
//! 5. All bookkeeping is reset, so the next mutation starts a new cycle.

use std::collections::{HashMap, HashSet};

use crate::error::Warning;
use crate::reactive::{Computation, ComputationId, Runtime, Scope};

/// Bookkeeping for one flush cycle.
#[derive(Default)]
pub(crate) struct FlushQueue {
    queue: Vec<Computation>,
    activated: Vec<Scope>,
    has: HashSet<ComputationId>,
    circular: HashMap<ComputationId, usize>,
    waiting: bool,
    flushing: bool,
    index: usize,
}

impl FlushQueue {
    /// Add a pending computation.
    ///
    /// Returns `None` if it was already pending, otherwise whether a flush
    /// has to be scheduled.
    fn push(&mut self, computation: Computation) -> Option<bool> {
        let id = computation.id();
        if !self.has.insert(id) {
            return None;
        }

        if self.flushing {
            // Keep the unprocessed part sorted, but never go back past the
            // entry currently running.
            let mut position = self.queue.len();
            while position > self.index + 1 && self.queue[position - 1].id() > id {
                position -= 1;
            }
            self.queue.insert(position, computation);
        } else {
            self.queue.push(computation);
        }

        Some(self.start_waiting())
    }

    fn start_waiting(&mut self) -> bool {
        !std::mem::replace(&mut self.waiting, true)
    }

    fn reset(&mut self) {
        self.queue.clear();
        self.activated.clear();
        self.has.clear();
        self.circular.clear();
        self.waiting = false;
        self.flushing = false;
        self.index = 0;
    }

    /// Number of computations waiting for the next flush.
    pub(crate) fn pending(&self) -> usize {
        self.has.len()
    }
}

enum Outcome {
    Completed,
    Failed,
    LoopDetected,
}

impl Runtime {
    /// Queue a computation for the next flush.
    pub(crate) fn queue_computation(&self, computation: Computation) {
        tracing::trace!(id = computation.id().raw(), "queueing computation");

        let schedule = self.0.queue.borrow_mut().push(computation);
        if schedule == Some(true) {
            self.schedule_flush();
        }
    }

    /// Queue a kept-alive scope whose activated hooks should fire after the
    /// current flush.
    pub fn queue_activated(&self, scope: &Scope) {
        // Render code running in this flush must already see it as active.
        scope.set_inactive(false);

        let schedule = {
            let mut queue = self.0.queue.borrow_mut();
            queue.activated.push(scope.clone());
            queue.start_waiting()
        };
        if schedule {
            self.schedule_flush();
        }
    }

    /// Number of computations waiting for the next flush.
    pub fn pending_computations(&self) -> usize {
        self.0.queue.borrow().pending()
    }

    fn schedule_flush(&self) {
        if self.config().is_batched() {
            let runtime = self.downgrade();
            self.next_tick(move || {
                if let Some(runtime) = runtime.upgrade() {
                    runtime.flush_queue();
                }
            });
        } else {
            self.flush_queue();
        }
    }

    /// Run every queued computation, then the post-flush hooks.
    pub(crate) fn flush_queue(&self) {
        let span = tracing::debug_span!("flush");
        let _enter = span.enter();

        {
            let mut queue = self.0.queue.borrow_mut();
            queue.flushing = true;
            queue.queue.sort_by_key(Computation::id);
        }

        let config = self.config();
        let mut index = 0;
        let outcome = loop {
            // No borrow may be held while running: computations re-enter the
            // queue.
            let computation = {
                let mut queue = self.0.queue.borrow_mut();
                queue.index = index;
                match queue.queue.get(index) {
                    Some(computation) => computation.clone(),
                    None => break Outcome::Completed,
                }
            };
            let id = computation.id();

            computation.run_before();
            self.0.queue.borrow_mut().has.remove(&id);

            if let Err(error) = computation.run() {
                self.report_error(&error, Some(computation.owner_id()));
                break Outcome::Failed;
            }

            if config.debug {
                let count = {
                    let mut queue = self.0.queue.borrow_mut();
                    if queue.has.contains(&id) {
                        let count = queue.circular.entry(id).or_insert(0);
                        *count += 1;
                        *count
                    } else {
                        0
                    }
                };

                if count > config.max_update_count {
                    let location = if computation.is_user() {
                        format!("in watcher with expression \"{}\"", computation.expression())
                    } else {
                        "in a component render function".to_string()
                    };
                    self.warn(
                        Warning::InfiniteUpdateLoop { location },
                        Some(computation.owner_id()),
                    );
                    break Outcome::LoopDetected;
                }
            }

            index += 1;
        };

        let (activated, mut updated) = {
            let mut queue = self.0.queue.borrow_mut();
            let activated = std::mem::take(&mut queue.activated);
            let updated = std::mem::take(&mut queue.queue);
            queue.reset();
            (activated, updated)
        };

        // Only entries that ran successfully count as updated.
        match outcome {
            Outcome::Completed => {}
            Outcome::Failed => updated.truncate(index),
            Outcome::LoopDetected => updated.truncate(index + 1),
        }

        tracing::debug!(ran = updated.len(), activated = activated.len(), "flush complete");

        for scope in activated.iter().rev() {
            scope.activate();
        }
        for computation in updated.iter().rev() {
            if let Some(owner) = computation.owner() {
                owner.call_updated(computation);
            }
        }
    }
}
