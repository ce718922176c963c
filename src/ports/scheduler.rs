//! Port abstraction for the cooperative run loop the channel posts its
//! continuations onto.
//!
//! Contract:
//! * Submitted tasks run strictly in submission order.
//! * A task never runs concurrently with another task, and `submit` never runs
//!   the task inline (the caller may still hold channel state).
//! * There is no cancellation; a task whose channel went away simply finds
//!   nothing to do.

/// Unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// Single-threaded FIFO scheduler.
pub trait Scheduler {
    /// Queue `task` behind every previously submitted task.
    fn submit(&self, task: Task);
}
