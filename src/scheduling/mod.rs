//! Appointment scheduling and the daily walk-in queue.
//!
//! `state` holds the pure lifecycle rules; `queue` applies them against
//! the database inside write transactions.

pub mod queue;
pub mod state;

pub use queue::*;
pub use state::{apply, Event, TransitionContext, TransitionError};
