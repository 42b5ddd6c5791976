//! Reactive Primitives
//!
//! This module implements the core reactive system: observable state,
//! dependency nodes and computations. These primitives form the foundation
//! of Weft's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Observable State
//!
//! State is a tree of [`Value`]s. Observing an [`Object`] turns each of its
//! properties into a reactive slot with its own [`Dep`]. Reading a slot while
//! a computation evaluates subscribes that computation; writing a different
//! value notifies it. An [`Array`] is tracked through one shape dep that its
//! seven mutating operations notify.
//!
//! ## Computations
//!
//! A [`Computation`] is a re-runnable unit of work: a render job, a computed
//! getter or a user watcher. Each evaluation re-collects the deps it reads,
//! so branches that are no longer taken stop triggering it.
//!
//! ## Computed Values
//!
//! A [`Computed`] is a lazy computation that caches its result until one of
//! its dependencies changes.
//!
//! ## Scopes
//!
//! A [`Scope`] owns root state and the computations installed into it, and
//! carries the lifecycle hooks the scheduler calls around updates.
//!
//! # Implementation Notes
//!
//! The evaluation context is a stack owned by the [`Runtime`], not a global.
//! Dependency nodes hold their subscribers weakly and computations hold their
//! dependency nodes strongly, so dropping a computation's last handle is
//! enough to detach it.

mod array;
mod computation;
mod computed;
mod context;
mod dep;
mod object;
mod observer;
mod runtime;
mod scope;
mod traverse;
mod value;

pub use array::Array;
pub use computation::{Callback, Computation, ComputationId, ComputationOptions, Getter, Hook};
pub use computed::{Computed, Setter};
pub use dep::{Dep, DepId};
pub use object::Object;
pub use observer::{DefineOptions, Observer};
pub use runtime::Runtime;
pub use scope::{Scope, ScopeId, WatchHandle, WatchOptions};
pub use traverse::traverse;
pub use value::{same_value, Key, Opaque, Value};
