//! Expiry Monitor
//!
//! Active battles carry a TTL from creation. An expired battle is forced
//! into a drawn finish with reason "timeout", sealed with a signed replay
//! like any other finish. Expiry runs lazily: on submission, on explicit
//! checks, and through per-user sweeps; there is no background reaper, so
//! every transition happens under the per-battle lock.

use chrono::Utc;
use tracing::info;

use crate::game::replay::SignedReplay;
use crate::game::state::{BattleId, Outcome, UserId};
use crate::service::battle::BattleService;
use crate::service::error::BattleError;
use crate::service::ports::{BattleRow, BattleStatus};

impl BattleService {
    /// True when an active battle has outlived its TTL.
    pub(crate) fn is_expired(&self, row: &BattleRow) -> bool {
        row.status == BattleStatus::Active
            && (Utc::now() - row.created_at).num_seconds() > self.ttl_secs
    }

    /// Force-draw an expired battle. Caller holds the battle lock and has
    /// checked expiry.
    pub(crate) async fn expire_locked(
        &self,
        row: BattleRow,
    ) -> Result<SignedReplay, BattleError> {
        let mut state = row.state.clone();
        state.finish_draw("timeout");
        self.store.update_state(row.id, state).await?;

        info!(battle_id = %row.id, "battle expired, forcing draw");
        self.finalize(
            &row,
            Outcome::Draw {
                reason: "timeout".to_string(),
            },
        )
        .await
    }

    /// Expire one battle if its TTL has lapsed.
    ///
    /// Returns whether a transition happened. Already-finished battles and
    /// battles still within their TTL are left alone, so repeated calls
    /// are idempotent.
    pub async fn expire_if_needed(&self, battle_id: BattleId) -> Result<bool, BattleError> {
        let _guard = self.store.lock(battle_id).await;

        let row = self.store.load(battle_id).await?;
        if row.status == BattleStatus::Finished || row.state.finished {
            return Ok(false);
        }
        if !self.is_expired(&row) {
            return Ok(false);
        }
        self.expire_locked(row).await?;
        Ok(true)
    }

    /// Expire every lapsed active battle a user participates in, returning
    /// how many were transitioned.
    pub async fn sweep_expired(&self, user: UserId) -> Result<usize, BattleError> {
        let ids = self.store.active_for(user).await?;
        let mut expired = 0;
        for id in ids {
            if self.expire_if_needed(id).await? {
                expired += 1;
            }
        }
        Ok(expired)
    }
}
