//! Battle logic.
//!
//! Deterministic over (seed, state, action): given the stored battle seed
//! and the sequence of submitted actions, every function here reproduces
//! identical effect logs and states.

pub mod action;
pub mod replay;
pub mod resolver;
pub mod state;
pub mod turn;
