//! Transition write operations

pub mod apply;
pub mod batch;

pub use apply::{ApplyTransitionError, TransitionCommand, TransitionOutcome};
pub use batch::{BatchTransitionCommand, BatchTransitionError, BatchTransitionOutcome};
