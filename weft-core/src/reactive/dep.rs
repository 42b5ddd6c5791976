//! Dependency Nodes
//!
//! A [`Dep`] identifies one observable slot: a reactive property, or the
//! shape of a container. It keeps the computations subscribed to it in
//! insertion order and broadcasts to them when the slot changes.
//!
//! Subscribers are held weakly. Computations own strong references to the
//! deps they read, so the graph never keeps a torn-down computation alive.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::computation::{Computation, ComputationId, WeakComputation};
use super::runtime::Runtime;

/// Unique identifier for a dependency node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepId(u64);

impl DepId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A broadcast channel for one observable slot.
#[derive(Clone)]
pub struct Dep(Rc<DepInner>);

struct DepInner {
    id: DepId,
    runtime: Runtime,
    subscribers: RefCell<IndexMap<ComputationId, WeakComputation>>,
}

impl Dep {
    pub fn new(runtime: &Runtime) -> Self {
        Self(Rc::new(DepInner {
            id: DepId::next(),
            runtime: runtime.clone(),
            subscribers: RefCell::new(IndexMap::new()),
        }))
    }

    pub fn id(&self) -> DepId {
        self.0.id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.0.runtime
    }

    /// Subscribe a computation. Subscribing twice keeps the first position.
    pub fn add_subscriber(&self, subscriber: &Computation) {
        self.0
            .subscribers
            .borrow_mut()
            .entry(subscriber.id())
            .or_insert_with(|| subscriber.downgrade());
    }

    pub fn remove_subscriber(&self, id: ComputationId) {
        self.0.subscribers.borrow_mut().shift_remove(&id);
    }

    /// Subscribe the computation currently evaluating, if there is one.
    pub fn depend(&self) {
        if let Some(target) = self.0.runtime.current_target() {
            target.add_dep(self);
        }
    }

    /// Tell every subscriber that the slot changed.
    ///
    /// The subscriber list is snapshotted first, so subscriptions made or
    /// dropped by the updates themselves do not affect this broadcast.
    pub fn notify(&self) {
        let mut subscribers: SmallVec<[Computation; 8]> = self
            .0
            .subscribers
            .borrow()
            .values()
            .filter_map(WeakComputation::upgrade)
            .collect();

        let config = self.0.runtime.config();
        if !config.is_batched() && config.debug {
            // Sync flushing never sorts the queue, so fire in creation order here.
            subscribers.sort_by_key(Computation::id);
        }

        for subscriber in subscribers {
            subscriber.update();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    /// Subscriber ids in notification order.
    pub fn subscriber_ids(&self) -> Vec<ComputationId> {
        self.0.subscribers.borrow().keys().copied().collect()
    }

    pub fn has_subscriber(&self, id: ComputationId) -> bool {
        self.0.subscribers.borrow().contains_key(&id)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.0.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
