//! Service Ports
//!
//! Traits the battle service drives its surroundings through: creature
//! catalog, type-effectiveness data, participant notifications, result
//! bookkeeping, and battle persistence. Adapters live behind these traits;
//! the in-memory set in [`crate::service::memory`] backs tests and the
//! demo binary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

use crate::core::typechart::{TypeChart, TypeRow};
use crate::game::replay::{SignedReplay, TurnRecord};
use crate::game::state::{BattleContext, BattleId, BattleState, Creature, Outcome, Role, UserId};

/// Errors surfaced by port implementations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested record does not exist.
    #[error("not found")]
    NotFound,

    /// An upstream data source could not be reached.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// The persistence layer failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Shorthand for port results.
pub type PortResult<T> = Result<T, PortError>;

/// Battle lifecycle status as persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleStatus {
    /// Accepting turn submissions.
    Active,
    /// Terminal; decisive or drawn.
    Finished,
}

/// One persisted battle.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct BattleRow {
    /// Battle identifier
    pub id: BattleId,
    /// Lifecycle status
    pub status: BattleStatus,
    /// First participant (side A)
    pub p1: UserId,
    /// Second participant (side B)
    pub p2: UserId,
    /// Side A's team snapshot
    pub team_a: Vec<Creature>,
    /// Side B's team snapshot
    pub team_b: Vec<Creature>,
    /// Battle seed
    pub seed: i64,
    /// Type chart embedded at battle start
    pub type_chart: TypeChart,
    /// Current battle state
    pub state: BattleState,
    /// Creation time, drives TTL expiry
    pub created_at: DateTime<Utc>,
    /// Final result once finished
    pub outcome: Option<Outcome>,
    /// Signed replay once finished
    pub replay: Option<SignedReplay>,
}

impl BattleRow {
    /// The immutable context this battle resolves against.
    pub fn context(&self) -> BattleContext {
        BattleContext {
            seed: self.seed,
            type_chart: self.type_chart.clone(),
            team_a: self.team_a.clone(),
            team_b: self.team_b.clone(),
        }
    }

    /// The side a user plays, if they participate.
    pub fn role_of(&self, user: UserId) -> Option<Role> {
        if user == self.p1 {
            Some(Role::A)
        } else if user == self.p2 {
            Some(Role::B)
        } else {
            None
        }
    }
}

/// Creature catalog with per-user ownership.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetch one creature owned by a user. `NotFound` covers both an
    /// unknown id and an id the user does not own.
    async fn user_creature(&self, user: UserId, creature_id: u32) -> PortResult<Creature>;
}

/// Type-effectiveness data source.
#[async_trait]
pub trait TypeData: Send + Sync {
    /// Effectiveness row for one attacking type (lowercase). Unlisted
    /// defender types are neutral; an unknown attacking type yields an
    /// empty row.
    async fn type_row(&self, attack_type: &str) -> PortResult<TypeRow>;
}

/// Participant notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an event to a user. Delivery is best effort; callers
    /// swallow failures.
    async fn notify(&self, user: UserId, event: &str, payload: serde_json::Value)
        -> PortResult<()>;
}

/// Result bookkeeping (win/loss/draw counters).
#[async_trait]
pub trait StatsSink: Send + Sync {
    /// Record a decisive result with battle-wide damage and crit totals.
    async fn record_result(
        &self,
        winner: UserId,
        loser: UserId,
        battle: BattleId,
        total_damage: i64,
        total_crits: u32,
    ) -> PortResult<()>;

    /// Record a draw for both participants.
    async fn record_draw(&self, p1: UserId, p2: UserId, battle: BattleId) -> PortResult<()>;
}

/// Battle persistence.
#[async_trait]
pub trait BattleStore: Send + Sync {
    /// Persist a new battle.
    async fn insert(&self, row: BattleRow) -> PortResult<()>;

    /// Load a battle by id.
    async fn load(&self, id: BattleId) -> PortResult<BattleRow>;

    /// Append one turn record to a battle's history.
    async fn append_turn(&self, id: BattleId, record: TurnRecord) -> PortResult<()>;

    /// Persist the current state of an active battle.
    async fn update_state(&self, id: BattleId, state: BattleState) -> PortResult<()>;

    /// Mark a battle finished with its outcome and signed replay.
    async fn finish(
        &self,
        id: BattleId,
        outcome: Outcome,
        replay: SignedReplay,
    ) -> PortResult<()>;

    /// Full turn history of a battle, in submission order.
    async fn turns(&self, id: BattleId) -> PortResult<Vec<TurnRecord>>;

    /// Ids of active battles a user participates in.
    async fn active_for(&self, user: UserId) -> PortResult<Vec<BattleId>>;

    /// Acquire the per-battle lock. All load-resolve-persist sequences
    /// run under it so concurrent submissions serialize.
    async fn lock(&self, id: BattleId) -> OwnedMutexGuard<()>;
}
