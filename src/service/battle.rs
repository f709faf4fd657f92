//! Battle Service
//!
//! Orchestrates the deterministic game layer against the ports: starts
//! battles from catalog snapshots, serializes turn submissions under the
//! per-battle lock, assembles and signs replays, and fans out
//! notifications. All rule evaluation stays in `game/`; this layer only
//! loads, delegates, and persists.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::rng::{derive_battle_seed, turn_seed, SeededRng};
use crate::core::sign::ReplaySigner;
use crate::core::typechart::TypeChart;
use crate::game::action::{normalize, ActionRequest};
use crate::game::replay::{totals, Replay, SignedReplay, TurnRecord};
use crate::game::resolver::step;
use crate::game::state::{BattleContext, BattleId, Creature, Outcome, Role, UserId};
use crate::game::turn::{advance, opening_state, reresolve_initiative};
use crate::service::error::BattleError;
use crate::service::ports::{
    BattleRow, BattleStatus, BattleStore, Catalog, Notifier, StatsSink, TypeData,
};
use crate::MAX_TEAM_SIZE;

/// Result of one accepted turn submission.
#[derive(Clone, Debug)]
pub enum TurnOutcome {
    /// The battle continues.
    Resolved {
        /// The half-turn just resolved
        record: TurnRecord,
    },
    /// This half-turn ended the battle.
    Finished {
        /// The half-turn just resolved
        record: TurnRecord,
        /// Final result
        outcome: Outcome,
    },
    /// The battle's TTL lapsed before this submission; it was force-drawn
    /// and no action was resolved.
    Expired {
        /// The timeout draw
        outcome: Outcome,
    },
}

impl TurnOutcome {
    /// The record of the half-turn that was resolved, if one was.
    pub fn record(&self) -> Option<&TurnRecord> {
        match self {
            TurnOutcome::Resolved { record } | TurnOutcome::Finished { record, .. } => {
                Some(record)
            }
            TurnOutcome::Expired { .. } => None,
        }
    }

    /// True once the battle reached a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TurnOutcome::Finished { .. } | TurnOutcome::Expired { .. }
        )
    }
}

/// Replay as served to a participant.
#[derive(Clone, Debug)]
pub enum ReplayView {
    /// Finished battle: the full signed history, verified before handout.
    Final(SignedReplay),
    /// Active battle: history so far, unsigned.
    Partial {
        /// Battle identifier
        battle_id: BattleId,
        /// Records resolved so far
        turns: Vec<TurnRecord>,
    },
}

/// The battle orchestration service.
pub struct BattleService {
    pub(crate) store: Arc<dyn BattleStore>,
    catalog: Arc<dyn Catalog>,
    type_data: Arc<dyn TypeData>,
    pub(crate) notifier: Arc<dyn Notifier>,
    stats: Arc<dyn StatsSink>,
    pub(crate) signer: ReplaySigner,
    pub(crate) ttl_secs: i64,
}

impl BattleService {
    /// Build a service over the given adapters.
    pub fn new(
        store: Arc<dyn BattleStore>,
        catalog: Arc<dyn Catalog>,
        type_data: Arc<dyn TypeData>,
        notifier: Arc<dyn Notifier>,
        stats: Arc<dyn StatsSink>,
        signer: ReplaySigner,
        ttl_secs: i64,
    ) -> Self {
        Self {
            store,
            catalog,
            type_data,
            notifier,
            stats,
            signer,
            ttl_secs,
        }
    }

    /// TTL applied to active battles.
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    // -------------------------------------------------------------------
    // Start
    // -------------------------------------------------------------------

    /// Start a battle between two users with the creatures they picked.
    ///
    /// Teams are snapshotted from the catalog and the type chart is
    /// embedded at creation, so later catalog or chart edits never affect
    /// a running battle. Turn 0 initiative is resolved immediately; the
    /// returned row tells both participants who acts first.
    pub async fn start_battle(
        &self,
        p1: UserId,
        p2: UserId,
        p1_creatures: &[u32],
        p2_creatures: &[u32],
    ) -> Result<BattleRow, BattleError> {
        if p1 == p2 {
            return Err(BattleError::InvalidTeam(
                "cannot battle yourself".to_string(),
            ));
        }
        let team_a = self.fetch_team(p1, p1_creatures).await?;
        let team_b = self.fetch_team(p2, p2_creatures).await?;
        let type_chart = self.fetch_type_chart(&team_a, &team_b).await?;

        let id: BattleId = Uuid::new_v4();
        let entropy = Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
        let seed = derive_battle_seed(&id, p1, p2, entropy);

        let ctx = BattleContext {
            seed,
            type_chart,
            team_a,
            team_b,
        };
        let state = opening_state(&ctx);

        let row = BattleRow {
            id,
            status: BattleStatus::Active,
            p1,
            p2,
            team_a: ctx.team_a,
            team_b: ctx.team_b,
            seed,
            type_chart: ctx.type_chart,
            state,
            created_at: Utc::now(),
            outcome: None,
            replay: None,
        };
        self.store.insert(row.clone()).await?;

        info!(
            battle_id = %id,
            p1,
            p2,
            seed,
            first_actor = row.state.next_actor.as_str(),
            "battle started"
        );
        self.notify_both(
            &row,
            "battle_started",
            json!({
                "battle_id": id,
                "first_actor": row.state.next_actor,
            }),
        )
        .await;

        Ok(row)
    }

    async fn fetch_team(
        &self,
        user: UserId,
        creature_ids: &[u32],
    ) -> Result<Vec<Creature>, BattleError> {
        if creature_ids.is_empty() || creature_ids.len() > MAX_TEAM_SIZE {
            return Err(BattleError::InvalidTeam(format!(
                "team must have 1 to {MAX_TEAM_SIZE} creatures"
            )));
        }
        let mut seen = BTreeSet::new();
        for &id in creature_ids {
            if !seen.insert(id) {
                return Err(BattleError::InvalidTeam(format!(
                    "duplicate creature {id}"
                )));
            }
        }

        join_all(
            creature_ids
                .iter()
                .map(|&id| self.catalog.user_creature(user, id)),
        )
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(Into::into)
    }

    async fn fetch_type_chart(
        &self,
        team_a: &[Creature],
        team_b: &[Creature],
    ) -> Result<TypeChart, BattleError> {
        let types: BTreeSet<String> = team_a
            .iter()
            .chain(team_b.iter())
            .flat_map(|c| c.types.iter())
            .map(|t| t.to_lowercase())
            .collect();

        let rows = join_all(types.iter().map(|t| self.type_data.type_row(t))).await;

        let mut chart = TypeChart::new();
        for (attack_type, row) in types.into_iter().zip(rows) {
            chart.insert(attack_type, row?);
        }
        Ok(chart)
    }

    // -------------------------------------------------------------------
    // Submit
    // -------------------------------------------------------------------

    /// Submit one action for the next pending half-turn.
    ///
    /// The whole load-resolve-persist sequence runs under the per-battle
    /// lock, so concurrent submissions to one battle serialize and the
    /// loser of the race gets `NotYourTurn` or `AlreadyFinished` against
    /// the updated state. Validation failures return before any write.
    pub async fn submit_turn(
        &self,
        battle_id: BattleId,
        user: UserId,
        request: &ActionRequest,
    ) -> Result<TurnOutcome, BattleError> {
        let _guard = self.store.lock(battle_id).await;

        let row = self.store.load(battle_id).await?;

        // TTL lapse finalizes the battle before anything else is considered;
        // a participant gets the timeout draw back instead of an error.
        if self.is_expired(&row) {
            let role = row.role_of(user);
            let signed = self.expire_locked(row).await?;
            if role.is_none() {
                return Err(BattleError::NotParticipant);
            }
            return Ok(TurnOutcome::Expired {
                outcome: signed.replay.outcome,
            });
        }

        let role = row.role_of(user).ok_or(BattleError::NotParticipant)?;
        if row.status == BattleStatus::Finished || row.state.finished {
            return Err(BattleError::AlreadyFinished);
        }

        let ctx = row.context();
        let mut state = row.state.clone();
        let action = normalize(request, &ctx, role, &state)?;

        // Rows persisted before initiative was recorded lack the detail,
        // and a corrupt order can name one side twice; re-derive so order
        // enforcement has something valid to stand on.
        if state.initiative.is_none() || state.order[0] == state.order[1] {
            reresolve_initiative(&ctx, &mut state);
        }
        if state.next_actor != role {
            return Err(BattleError::NotYourTurn);
        }

        let sub_seed = turn_seed(ctx.seed, state.turn, state.phase.seed_offset());
        let mut rng = SeededRng::new(sub_seed);
        let (log, resolved) = step(&ctx, role, &action, &state, &mut rng);

        let record = TurnRecord {
            turn: state.turn + 1,
            phase: state.phase,
            seed: sub_seed,
            first_actor: state.order[0],
            actor: role,
            action,
            log,
            state: resolved.clone(),
        };
        self.store.append_turn(battle_id, record.clone()).await?;

        if resolved.finished {
            let outcome = resolved.outcome().ok_or(BattleError::IntegrityFailure)?;
            self.store.update_state(battle_id, resolved).await?;
            self.finalize(&row, outcome.clone()).await?;
            return Ok(TurnOutcome::Finished { record, outcome });
        }

        let mut next = resolved;
        advance(&ctx, &mut next);
        self.store.update_state(battle_id, next.clone()).await?;

        debug!(
            battle_id = %battle_id,
            turn = record.turn,
            actor = role.as_str(),
            "half-turn resolved"
        );
        self.notify_both(
            &row,
            "turn_resolved",
            json!({
                "battle_id": battle_id,
                "turn": record.turn,
                "actor": role,
                "next_actor": next.next_actor,
            }),
        )
        .await;

        Ok(TurnOutcome::Resolved { record })
    }

    // -------------------------------------------------------------------
    // Finish
    // -------------------------------------------------------------------

    /// Assemble, sign, and persist the final replay, then notify and
    /// record results. Caller holds the battle lock and has already
    /// persisted the terminal state.
    pub(crate) async fn finalize(
        &self,
        row: &BattleRow,
        outcome: Outcome,
    ) -> Result<SignedReplay, BattleError> {
        let turns = self.store.turns(row.id).await?;
        let replay = Replay {
            battle_id: row.id,
            seed: row.seed,
            type_chart: row.type_chart.clone(),
            turns,
            outcome: outcome.clone(),
        };
        let signature = self.signer.sign(&replay)?;
        let signed = SignedReplay { replay, signature };

        self.store
            .finish(row.id, outcome.clone(), signed.clone())
            .await?;
        info!(battle_id = %row.id, ?outcome, "battle finished");

        self.notify_both(
            row,
            "battle_ended",
            json!({
                "battle_id": row.id,
                "outcome": outcome,
            }),
        )
        .await;

        // Result bookkeeping failures are logged but never unwind a
        // battle that is already persisted as finished.
        let recorded = match &outcome {
            Outcome::Decisive { winner, .. } => {
                let (winner_user, loser_user) = match winner {
                    Role::A => (row.p1, row.p2),
                    Role::B => (row.p2, row.p1),
                };
                self.notify(winner_user, "victory", json!({ "battle_id": row.id }))
                    .await;
                self.notify(loser_user, "defeat", json!({ "battle_id": row.id }))
                    .await;
                let (a, b) = totals(&signed.replay.turns);
                self.stats
                    .record_result(
                        winner_user,
                        loser_user,
                        row.id,
                        a.damage + b.damage,
                        a.crits + b.crits,
                    )
                    .await
            }
            Outcome::Draw { .. } => self.stats.record_draw(row.p1, row.p2, row.id).await,
        };
        if let Err(err) = recorded {
            warn!(battle_id = %row.id, %err, "failed to record battle result");
        }

        Ok(signed)
    }

    // -------------------------------------------------------------------
    // Replay
    // -------------------------------------------------------------------

    /// Fetch a battle's replay for a participant.
    ///
    /// A lapsed active battle is force-drawn first, so the first access
    /// after the TTL already serves the final timeout replay. A finished
    /// battle returns the stored signed replay, re-verified against the
    /// server secret; a missing or tampered replay is refused as an
    /// integrity failure rather than served. An active battle returns the
    /// unsigned history so far.
    pub async fn get_replay(
        &self,
        battle_id: BattleId,
        user: UserId,
    ) -> Result<ReplayView, BattleError> {
        let _guard = self.store.lock(battle_id).await;

        let mut row = self.store.load(battle_id).await?;
        if self.is_expired(&row) {
            self.expire_locked(row).await?;
            row = self.store.load(battle_id).await?;
        }
        row.role_of(user).ok_or(BattleError::NotParticipant)?;

        if row.status == BattleStatus::Finished {
            let signed = row.replay.ok_or(BattleError::IntegrityFailure)?;
            if !self.signer.verify(&signed.replay, &signed.signature) {
                warn!(battle_id = %battle_id, "stored replay failed verification");
                return Err(BattleError::IntegrityFailure);
            }
            return Ok(ReplayView::Final(signed));
        }

        let turns = self.store.turns(battle_id).await?;
        Ok(ReplayView::Partial { battle_id, turns })
    }

    // -------------------------------------------------------------------
    // Notifications
    // -------------------------------------------------------------------

    pub(crate) async fn notify(&self, user: UserId, event: &str, payload: serde_json::Value) {
        if let Err(err) = self.notifier.notify(user, event, payload).await {
            debug!(user, event, %err, "notification dropped");
        }
    }

    pub(crate) async fn notify_both(
        &self,
        row: &BattleRow,
        event: &str,
        payload: serde_json::Value,
    ) {
        self.notify(row.p1, event, payload.clone()).await;
        self.notify(row.p2, event, payload).await;
    }
}
