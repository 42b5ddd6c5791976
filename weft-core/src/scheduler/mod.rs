//! Update Scheduler
//!
//! This module decides when and in which order queued computations run.
//!
//! # Overview
//!
//! A notified computation is not run on the spot. It is put in the flush
//! queue, and the whole queue is run in one pass on the next tick:
//!
//! - A computation is queued at most once per pass, no matter how many of
//!   its dependencies changed.
//!
//! - The pass runs computations in ascending id order. Ids grow with
//!   creation time, so an outer scope's work runs before an inner one and
//!   user watchers run before the render job they may influence.
//!
//! - Computations queued while the pass is running are spliced in by id,
//!   but never before the current position.
//!
//! The tick queue is the deferral mechanism underneath: a FIFO of callbacks
//! that the host drains synchronously, awaits, or hands to a tokio driver
//! task.

mod queue;
mod tick;

pub(crate) use queue::FlushQueue;
pub(crate) use tick::TickQueue;
