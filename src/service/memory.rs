//! In-Memory Adapters
//!
//! Port implementations backed by process memory, used by the demo binary
//! and the integration tests. Maps are `BTreeMap` so iteration order is
//! stable across runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::core::typechart::{TypeChart, TypeRow};
use crate::game::replay::{SignedReplay, TurnRecord};
use crate::game::state::{BattleId, BattleState, Creature, Outcome, UserId};
use crate::service::ports::{
    BattleRow, BattleStatus, BattleStore, Catalog, Notifier, PortError, PortResult, StatsSink,
    TypeData,
};

// =============================================================================
// STORE
// =============================================================================

struct StoredBattle {
    row: BattleRow,
    turns: Vec<TurnRecord>,
}

/// Battle store backed by process memory.
#[derive(Default)]
pub struct InMemoryStore {
    rows: RwLock<BTreeMap<BattleId, StoredBattle>>,
    locks: Mutex<BTreeMap<BattleId, Arc<Mutex<()>>>>,
}

impl InMemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            locks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Shift a battle's creation time into the past. Lets tests lapse a
    /// TTL without sleeping.
    pub async fn backdate(&self, id: BattleId, secs: i64) -> PortResult<()> {
        let mut rows = self.rows.write().await;
        let stored = rows.get_mut(&id).ok_or(PortError::NotFound)?;
        stored.row.created_at -= Duration::seconds(secs);
        Ok(())
    }
}

#[async_trait]
impl BattleStore for InMemoryStore {
    async fn insert(&self, row: BattleRow) -> PortResult<()> {
        let mut rows = self.rows.write().await;
        rows.insert(
            row.id,
            StoredBattle {
                row,
                turns: Vec::new(),
            },
        );
        Ok(())
    }

    async fn load(&self, id: BattleId) -> PortResult<BattleRow> {
        let rows = self.rows.read().await;
        rows.get(&id)
            .map(|stored| stored.row.clone())
            .ok_or(PortError::NotFound)
    }

    async fn append_turn(&self, id: BattleId, record: TurnRecord) -> PortResult<()> {
        let mut rows = self.rows.write().await;
        let stored = rows.get_mut(&id).ok_or(PortError::NotFound)?;
        stored.turns.push(record);
        Ok(())
    }

    async fn update_state(&self, id: BattleId, state: BattleState) -> PortResult<()> {
        let mut rows = self.rows.write().await;
        let stored = rows.get_mut(&id).ok_or(PortError::NotFound)?;
        stored.row.state = state;
        Ok(())
    }

    async fn finish(
        &self,
        id: BattleId,
        outcome: Outcome,
        replay: SignedReplay,
    ) -> PortResult<()> {
        let mut rows = self.rows.write().await;
        let stored = rows.get_mut(&id).ok_or(PortError::NotFound)?;
        stored.row.status = BattleStatus::Finished;
        stored.row.outcome = Some(outcome);
        stored.row.replay = Some(replay);
        Ok(())
    }

    async fn turns(&self, id: BattleId) -> PortResult<Vec<TurnRecord>> {
        let rows = self.rows.read().await;
        rows.get(&id)
            .map(|stored| stored.turns.clone())
            .ok_or(PortError::NotFound)
    }

    async fn active_for(&self, user: UserId) -> PortResult<Vec<BattleId>> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|stored| {
                stored.row.status == BattleStatus::Active
                    && (stored.row.p1 == user || stored.row.p2 == user)
            })
            .map(|stored| stored.row.id)
            .collect())
    }

    async fn lock(&self, id: BattleId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Creature catalog backed by a fixed ownership map.
#[derive(Default)]
pub struct InMemoryCatalog {
    creatures: BTreeMap<UserId, BTreeMap<u32, Creature>>,
}

impl InMemoryCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Give a creature to a user.
    pub fn add(&mut self, user: UserId, creature: Creature) {
        self.creatures
            .entry(user)
            .or_default()
            .insert(creature.id, creature);
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn user_creature(&self, user: UserId, creature_id: u32) -> PortResult<Creature> {
        self.creatures
            .get(&user)
            .and_then(|owned| owned.get(&creature_id))
            .cloned()
            .ok_or(PortError::NotFound)
    }
}

// =============================================================================
// TYPE DATA
// =============================================================================

/// Type-effectiveness source over a fixed chart.
pub struct StaticTypeData {
    chart: TypeChart,
    fail: bool,
}

impl StaticTypeData {
    /// Serve rows from the given chart; unknown types are empty (neutral).
    pub fn new(chart: TypeChart) -> Self {
        Self { chart, fail: false }
    }

    /// A source whose every fetch fails, for outage tests.
    pub fn failing() -> Self {
        Self {
            chart: TypeChart::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl TypeData for StaticTypeData {
    async fn type_row(&self, attack_type: &str) -> PortResult<TypeRow> {
        if self.fail {
            return Err(PortError::Unavailable("type data offline".to_string()));
        }
        Ok(self
            .chart
            .get(&attack_type.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}

// =============================================================================
// NOTIFIER / STATS
// =============================================================================

/// Notifier that records every delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(UserId, String, serde_json::Value)>>,
    fail: bool,
}

impl RecordingNotifier {
    /// Recording notifier that accepts every delivery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier whose every delivery fails, for best-effort tests.
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Events delivered so far.
    pub async fn events(&self) -> Vec<(UserId, String, serde_json::Value)> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        user: UserId,
        event: &str,
        payload: serde_json::Value,
    ) -> PortResult<()> {
        if self.fail {
            return Err(PortError::Unavailable("notifier offline".to_string()));
        }
        self.events
            .lock()
            .await
            .push((user, event.to_string(), payload));
        Ok(())
    }
}

/// One recorded result event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatsEvent {
    /// Decisive result.
    Result {
        /// Winning user
        winner: UserId,
        /// Losing user
        loser: UserId,
        /// Battle it came from
        battle: BattleId,
        /// Damage dealt by both sides combined
        total_damage: i64,
        /// Crits landed by both sides combined
        total_crits: u32,
    },
    /// Drawn result.
    Draw {
        /// First participant
        p1: UserId,
        /// Second participant
        p2: UserId,
        /// Battle it came from
        battle: BattleId,
    },
}

/// Stats sink that records every result.
#[derive(Default)]
pub struct RecordingStats {
    events: Mutex<Vec<StatsEvent>>,
    fail: bool,
}

impl RecordingStats {
    /// Recording sink that accepts every result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose every write fails, for best-effort tests.
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Results recorded so far.
    pub async fn events(&self) -> Vec<StatsEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl StatsSink for RecordingStats {
    async fn record_result(
        &self,
        winner: UserId,
        loser: UserId,
        battle: BattleId,
        total_damage: i64,
        total_crits: u32,
    ) -> PortResult<()> {
        if self.fail {
            return Err(PortError::Storage("stats offline".to_string()));
        }
        self.events.lock().await.push(StatsEvent::Result {
            winner,
            loser,
            battle,
            total_damage,
            total_crits,
        });
        Ok(())
    }

    async fn record_draw(&self, p1: UserId, p2: UserId, battle: BattleId) -> PortResult<()> {
        if self.fail {
            return Err(PortError::Storage("stats offline".to_string()));
        }
        self.events
            .lock()
            .await
            .push(StatsEvent::Draw { p1, p2, battle });
        Ok(())
    }
}
