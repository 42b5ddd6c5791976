//! Tick Queue
//!
//! Deferred callbacks run in batches. A batch is everything queued before it
//! started; callbacks queued while a batch runs form the next one.
//!
//! The host decides when ticks happen:
//!
//! - [`Runtime::drain_ticks`] runs every pending batch synchronously.
//! - [`Runtime::tick`] yields to the tokio scheduler once, then drains.
//! - [`Runtime::spawn_driver`] spawns a local task that drains whenever
//!   something is queued.

use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::reactive::Runtime;

type Deferred = Box<dyn FnOnce()>;

#[derive(Default)]
pub(crate) struct TickQueue {
    callbacks: RefCell<Vec<Deferred>>,
    notify: Rc<Notify>,
}

impl Runtime {
    /// Run `callback` on the next tick.
    pub fn next_tick(&self, callback: impl FnOnce() + 'static) {
        self.0.ticks.callbacks.borrow_mut().push(Box::new(callback));
        self.0.ticks.notify.notify_one();
    }

    pub fn has_pending_ticks(&self) -> bool {
        !self.0.ticks.callbacks.borrow().is_empty()
    }

    /// Run queued callbacks until none are left. Returns how many ran.
    pub fn drain_ticks(&self) -> usize {
        let mut ran = 0;
        loop {
            let batch = std::mem::take(&mut *self.0.ticks.callbacks.borrow_mut());
            if batch.is_empty() {
                break;
            }

            tracing::trace!(callbacks = batch.len(), "running tick");
            for callback in batch {
                callback();
                ran += 1;
            }
        }
        ran
    }

    /// Let other tasks run once, then drain the tick queue.
    pub async fn tick(&self) -> usize {
        tokio::task::yield_now().await;
        self.drain_ticks()
    }

    /// Spawn a task that drains the tick queue whenever work is queued.
    ///
    /// Must be called from within a [`tokio::task::LocalSet`]. The task only
    /// holds a weak handle; it stops at the first wake-up after the runtime
    /// is gone. Abort it through the returned handle to stop it earlier.
    pub fn spawn_driver(&self) -> JoinHandle<()> {
        let runtime = self.downgrade();
        let notify = self.0.ticks.notify.clone();

        tokio::task::spawn_local(async move {
            loop {
                notify.notified().await;
                // Let the code that queued the work finish its batch first.
                tokio::task::yield_now().await;

                let Some(runtime) = runtime.upgrade() else {
                    break;
                };
                runtime.drain_ticks();
            }
            tracing::debug!("tick driver stopped");
        })
    }
}
