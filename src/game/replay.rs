//! Replay Records
//!
//! One `TurnRecord` is appended per resolved half-turn; a finished battle's
//! full history plus its outcome forms a `Replay`, which is signed into a
//! `SignedReplay` before being handed out. Records carry everything needed
//! to re-derive the half-turn: the consumed sub-seed, the acting side, the
//! validated action, the effect log, and the resulting state.

use serde::{Deserialize, Serialize};

use crate::core::typechart::TypeChart;
use crate::game::action::Action;
use crate::game::resolver::LogEntry;
use crate::game::state::{BattleId, BattleState, Outcome, Phase, Role};

/// Record of one resolved half-turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// 1-based turn number
    pub turn: u64,
    /// Which half of the turn this was
    pub phase: Phase,
    /// Sub-seed consumed by the resolver
    pub seed: i64,
    /// Side that held initiative this turn
    pub first_actor: Role,
    /// Side that acted
    pub actor: Role,
    /// The validated action
    pub action: Action,
    /// Effects produced by the resolver
    pub log: Vec<LogEntry>,
    /// Battle state after this half-turn, before turn bookkeeping
    pub state: BattleState,
}

/// Full history of a finished battle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Replay {
    /// Battle identifier
    pub battle_id: BattleId,
    /// Battle seed; replaying the recorded actions under it reproduces
    /// every log entry and state byte for byte
    pub seed: i64,
    /// Type chart the battle was resolved against
    pub type_chart: TypeChart,
    /// One record per half-turn, in submission order
    pub turns: Vec<TurnRecord>,
    /// Final result
    pub outcome: Outcome,
}

/// A replay plus its integrity tag. Handed out only after the stored
/// signature has been re-verified.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedReplay {
    /// The signed history
    #[serde(flatten)]
    pub replay: Replay,
    /// Hex-encoded HMAC-SHA256 over the replay's canonical JSON
    pub signature: String,
}

/// Per-side aggregates over a turn history, for result bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SideTotals {
    /// Total damage dealt
    pub damage: i64,
    /// Hits that crit
    pub crits: u32,
    /// Attacks that missed
    pub misses: u32,
}

/// Sum damage, crits, and misses per side over a turn history.
pub fn totals(turns: &[TurnRecord]) -> (SideTotals, SideTotals) {
    let mut a = SideTotals::default();
    let mut b = SideTotals::default();

    for record in turns {
        for entry in &record.log {
            match *entry {
                LogEntry::Hit {
                    actor, dmg, crit, ..
                } => {
                    let side = if actor == Role::A { &mut a } else { &mut b };
                    side.damage += i64::from(dmg);
                    if crit {
                        side.crits += 1;
                    }
                }
                LogEntry::Miss { actor, .. } => {
                    let side = if actor == Role::A { &mut a } else { &mut b };
                    side.misses += 1;
                }
                _ => {}
            }
        }
    }
    (a, b)
}

// =============================================================================
// TESTS
// =============================================================================
