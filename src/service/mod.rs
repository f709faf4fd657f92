//! Orchestration layer.
//!
//! Everything non-deterministic lives here: persistence, upstream data
//! sources, notifications, and the wall clock. The battle service drives
//! the deterministic game layer through the port traits in [`ports`].

pub mod battle;
pub mod bot;
pub mod error;
pub mod expiry;
pub mod memory;
pub mod ports;
