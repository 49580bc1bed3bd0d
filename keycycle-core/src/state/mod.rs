//! Cycle state machine
//!
//! One station at a time is driven through a timed engage/return motion.
//! The transition function is pure: it takes the current machine and the
//! inputs sampled for this tick, and returns the next machine plus the
//! side effects to perform as data.

pub mod actions;
pub mod machine;

pub use actions::{Action, Actions, TickInput, MAX_ACTIONS};
pub use machine::{CycleMachine, CycleProfile, CycleState};
