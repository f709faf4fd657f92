//! Deterministic primitives.
//!
//! Everything in this module is pure: no I/O, no wall clock, no global
//! state. The battle engine's reproducibility rests on these types.

pub mod rng;
pub mod sign;
pub mod typechart;
