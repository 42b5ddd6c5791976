//! Weft Core
//!
//! This crate provides the core runtime for the Weft reactive state engine.
//! It implements:
//!
//! - Observable state (objects, arrays and reactive properties)
//! - Automatic dependency tracking for computations
//! - Lazily cached computed values and user watchers
//! - A deduplicating, id-ordered update scheduler driven by ticks
//!
//! The crate is single-threaded: state and computations are `Rc` handles
//! tied to one [`Runtime`](reactive::Runtime).
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Observable state, dependency nodes and computations
//! - `scheduler`: The flush queue and the tick queue, driven through `Runtime`
//! - `config`: Runtime tunables
//! - `error`: Error types and the reporting channel
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use weft_core::reactive::{Runtime, Value};
//!
//! let runtime = Runtime::default();
//! let scope = runtime.scope(Value::from_json(serde_json::json!({ "count": 1 })));
//!
//! // Create a derived value
//! let doubled = scope
//!     .computed(|scope| {
//!         let count = scope.data().get("count").and_then(|v| v.as_f64()).unwrap_or(0.0);
//!         Ok(Value::from(count * 2.0))
//!     })
//!     .unwrap();
//!
//! // Install a render job that reads it
//! let renders = Rc::new(Cell::new(0));
//! let counter = renders.clone();
//! scope
//!     .mount(move |_| {
//!         counter.set(counter.get() + 1);
//!         Ok(doubled.get()?)
//!     })
//!     .unwrap();
//!
//! // Mutations are batched until the next tick
//! scope.data().insert("count", 5);
//! scope.data().insert("count", 6);
//! runtime.drain_ticks();
//! assert_eq!(renders.get(), 2);
//! ```

pub mod config;
pub mod error;
pub mod reactive;
mod scheduler;

pub use config::{FlushMode, RuntimeConfig};
pub use error::{BoxError, ReactiveError, RecordingReporter, Reporter, TracingReporter, Warning};
pub use reactive::{Runtime, Scope, Value};
