//! Battle State Definitions
//!
//! All state types for battle simulation. Teams are immutable snapshots
//! embedded at battle start; `BattleState` is the only mutable record and
//! is mutated exclusively through the resolver and turn bookkeeping.

use serde::{Deserialize, Serialize};

use crate::core::typechart::TypeChart;

/// External account identifier of a participant.
pub type UserId = i64;

/// Unique battle identifier.
pub type BattleId = uuid::Uuid;

/// Base stats of a creature, fixed at battle start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Hit points
    pub hp: i32,
    /// Attack power
    pub attack: i32,
    /// Damage mitigation
    pub defense: i32,
    /// Initiative and crit-rate driver
    pub speed: i32,
}

/// Immutable creature snapshot embedded in the battle row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Creature {
    /// Catalog identifier
    pub id: u32,
    /// Display name
    pub name: String,
    /// Ordered types (1-2); lowercase by convention, lookups tolerate any case
    pub types: Vec<String>,
    /// Base stats
    pub stats: Stats,
}

/// Which side of the battle a participant plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// First participant's side
    A,
    /// Second participant's side
    B,
}

impl Role {
    /// The other side.
    #[inline]
    pub fn opponent(self) -> Role {
        match self {
            Role::A => Role::B,
            Role::B => Role::A,
        }
    }

    /// Wire representation ("a" / "b").
    pub fn as_str(self) -> &'static str {
        match self {
            Role::A => "a",
            Role::B => "b",
        }
    }
}

/// Which half of the current turn is pending.
///
/// Serialized as 0/1 to stay readable next to the sub-seed arithmetic
/// (half-turn seed offset is `phase index + 1`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Phase {
    /// First actor in the turn order has yet to act.
    First,
    /// First actor acted; second actor pending.
    Second,
}

impl Phase {
    /// Index into the turn order (0 or 1).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Phase::First => 0,
            Phase::Second => 1,
        }
    }

    /// Sub-seed offset for this half-turn (1 or 2; 0 is the initiative check).
    #[inline]
    pub fn seed_offset(self) -> i64 {
        match self {
            Phase::First => 1,
            Phase::Second => 2,
        }
    }
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> u8 {
        phase.index() as u8
    }
}

impl TryFrom<u8> for Phase {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Phase::First),
            1 => Ok(Phase::Second),
            other => Err(format!("invalid phase {other}, expected 0 or 1")),
        }
    }
}

/// Lingering per-side effects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Effects {
    /// Multiplier applied to outgoing damage (>= 0)
    pub atk_mod: f64,
    /// Turns before `atk_mod` resets to neutral
    pub atk_turns: u32,
    /// Remaining defend charges; each incoming hit consumes one and is halved
    pub defend: u32,
}

impl Default for Effects {
    fn default() -> Self {
        Self {
            atk_mod: 1.0,
            atk_turns: 0,
            defend: 0,
        }
    }
}

impl Effects {
    /// Reset to neutral (used on every switch).
    pub fn reset(&mut self) {
        *self = Effects::default();
    }
}

/// Mutable state of one side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SideState {
    /// Index of the creature currently fighting
    pub active: usize,
    /// Current hp per team slot (same length as the team, never negative)
    pub hp: Vec<i32>,
    /// Lingering effects
    pub effects: Effects,
}

impl SideState {
    /// Fresh side: lead creature active, everyone at full hp, neutral effects.
    pub fn fresh(team: &[Creature]) -> Self {
        Self {
            active: 0,
            hp: team.iter().map(|c| c.stats.hp).collect(),
            effects: Effects::default(),
        }
    }

    /// Repair state loaded from older schema versions.
    ///
    /// A mismatched hp-array length is reset to full hp, negative entries
    /// are clamped to 0, and the active index is clamped into range. Kept
    /// as an explicit normalization step even though freshly constructed
    /// states always satisfy these invariants.
    pub fn reconcile(&mut self, team: &[Creature]) {
        if self.hp.len() != team.len() {
            self.hp = team.iter().map(|c| c.stats.hp).collect();
        } else {
            for hp in &mut self.hp {
                *hp = (*hp).max(0);
            }
        }
        self.active = self.active.min(team.len().saturating_sub(1));
    }

    /// Current hp of the active creature.
    pub fn active_hp(&self) -> i32 {
        self.hp.get(self.active).copied().unwrap_or(0)
    }

    /// First slot with a living creature, if any.
    pub fn first_living(&self) -> Option<usize> {
        self.hp.iter().position(|&hp| hp > 0)
    }
}

/// How initiative was decided for a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitiativeMethod {
    /// Strict speed comparison
    Speed,
    /// Exact speed tie, seeded coin flip
    Tiebreak,
}

/// Record of one initiative resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitiativeDetail {
    /// Sub-seed consumed (offset 0 of the turn)
    pub seed: i64,
    /// Side acting first
    pub winner: Role,
    /// How the winner was decided
    pub method: InitiativeMethod,
    /// Side A's active-creature speed at resolution time
    pub a_speed: i32,
    /// Side B's active-creature speed at resolution time
    pub b_speed: i32,
    /// Coin flip value when method is tiebreak
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiebreak: Option<u8>,
}

/// Final result of a battle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum Outcome {
    /// One side won.
    Decisive {
        /// Winning side
        winner: Role,
        /// Losing side
        loser: Role,
    },
    /// No winner.
    Draw {
        /// Why the battle drew ("timeout", "engine")
        reason: String,
    },
}

impl Outcome {
    /// True for draws.
    pub fn is_draw(&self) -> bool {
        matches!(self, Outcome::Draw { .. })
    }
}

/// Immutable context a battle is resolved against: seed, embedded type
/// chart, and both team snapshots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BattleContext {
    /// Battle seed fixing all randomness
    pub seed: i64,
    /// Type chart embedded at battle start
    pub type_chart: TypeChart,
    /// Side A's team (1-3 creatures)
    pub team_a: Vec<Creature>,
    /// Side B's team (1-3 creatures)
    pub team_b: Vec<Creature>,
}

impl BattleContext {
    /// Team snapshot for a side.
    pub fn team(&self, role: Role) -> &[Creature] {
        match role {
            Role::A => &self.team_a,
            Role::B => &self.team_b,
        }
    }

    /// The creature currently fighting for a side.
    ///
    /// The index is clamped; teams are validated non-empty at creation.
    pub fn active_creature<'a>(&'a self, role: Role, state: &BattleState) -> &'a Creature {
        let team = self.team(role);
        let idx = state.side(role).active.min(team.len().saturating_sub(1));
        &team[idx]
    }
}

/// Complete mutable state of a battle.
///
/// Invariant: exactly one of {active} or {finished with winner and loser,
/// or finished as a draw}. Created at battle start (turn 0, phase 0,
/// initiative resolved), mutated only through the resolver and turn
/// bookkeeping, immutable once finished.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BattleState {
    /// Turn index, 0-based
    pub turn: u64,
    /// Pending half of the current turn
    pub phase: Phase,
    /// Acting order for the current turn
    pub order: [Role; 2],
    /// Side expected to submit next
    pub next_actor: Role,
    /// How the current turn's initiative was decided
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiative: Option<InitiativeDetail>,
    /// Side A state
    pub a: SideState,
    /// Side B state
    pub b: SideState,
    /// Terminal flag
    pub finished: bool,
    /// Winning side when decisive
    pub winner: Option<Role>,
    /// Losing side when decisive
    pub loser: Option<Role>,
    /// Why the battle finished without a winner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl BattleState {
    /// Side state for a role.
    pub fn side(&self, role: Role) -> &SideState {
        match role {
            Role::A => &self.a,
            Role::B => &self.b,
        }
    }

    /// Mutable side state for a role.
    pub fn side_mut(&mut self, role: Role) -> &mut SideState {
        match role {
            Role::A => &mut self.a,
            Role::B => &mut self.b,
        }
    }

    /// Mark the battle decisively won.
    pub fn finish_decisive(&mut self, winner: Role) {
        self.finished = true;
        self.winner = Some(winner);
        self.loser = Some(winner.opponent());
    }

    /// Mark the battle drawn.
    pub fn finish_draw(&mut self, reason: &str) {
        self.finished = true;
        self.winner = None;
        self.loser = None;
        self.finish_reason = Some(reason.to_string());
    }

    /// Outcome of a finished battle; `None` while still active.
    ///
    /// A finished state missing either winner or loser is reported as a
    /// draw with reason "engine" rather than a half-decided result.
    pub fn outcome(&self) -> Option<Outcome> {
        if !self.finished {
            return None;
        }
        match (self.winner, self.loser) {
            (Some(winner), Some(loser)) => Some(Outcome::Decisive { winner, loser }),
            _ => Some(Outcome::Draw {
                reason: self
                    .finish_reason
                    .clone()
                    .unwrap_or_else(|| "engine".to_string()),
            }),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
