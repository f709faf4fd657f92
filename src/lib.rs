//! # Mon Arena Server
//!
//! Deterministic battle simulation and turn resolution core for a turn-based
//! two-combatant creature battle game.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     MON ARENA SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Xorshift128+ PRNG, sub-seed derivation    │
//! │  ├── typechart.rs- Type-effectiveness multiplier table       │
//! │  └── sign.rs     - HMAC-SHA256 replay signing/verification   │
//! │                                                              │
//! │  game/           - Battle logic (deterministic)              │
//! │  ├── state.rs    - Creatures, sides, battle state            │
//! │  ├── action.rs   - Action union + normalization              │
//! │  ├── resolver.rs - Half-turn combat resolution               │
//! │  ├── turn.rs     - Initiative and phase bookkeeping          │
//! │  └── replay.rs   - Turn records and replay assembly          │
//! │                                                              │
//! │  service/        - Orchestration (non-deterministic)         │
//! │  ├── ports.rs    - Catalog/TypeData/Notifier/Stats/Store     │
//! │  ├── battle.rs   - Start battle, submit turn, get replay     │
//! │  ├── expiry.rs   - TTL expiry monitor                        │
//! │  ├── bot.rs      - Bot autoplay                              │
//! │  ├── error.rs    - Service error taxonomy                    │
//! │  └── memory.rs   - In-memory adapters (tests, demo)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are **100% deterministic**:
//! - No system time dependencies, no I/O
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - All randomness from seeded Xorshift128+, one fresh generator per
//!   half-turn derived from `seed + turn * 3 + phase offset`
//!
//! Given the stored battle seed and the submitted actions, every half-turn
//! reproduces an identical effect log and state, so finished battles replay
//! bit-for-bit from persistence alone.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod service;

// Re-export commonly used types
pub use crate::core::rng::{turn_seed, SeededRng, TURN_SEED_STRIDE};
pub use crate::core::sign::ReplaySigner;
pub use crate::core::typechart::{multiplier, TypeChart};
pub use crate::game::action::{Action, ActionRequest};
pub use crate::game::replay::{Replay, SignedReplay, TurnRecord};
pub use crate::game::state::{BattleState, Creature, Outcome, Role, Stats, UserId};
pub use crate::service::battle::BattleService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default time-to-live for an active battle (seconds)
pub const BATTLE_TTL_SECS: i64 = 15 * 60;

/// Maximum creatures per team
pub const MAX_TEAM_SIZE: usize = 3;
