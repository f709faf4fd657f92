//! Bot Autoplay
//!
//! A greedy scripted opponent: each time it holds the pending half-turn it
//! attacks with whichever of its active creature's types is most effective
//! against the opponent's active creature, falling back to defend when the
//! creature has no types. The loop is bounded by an action budget and
//! stops as soon as the battle finishes or the turn passes to the human.

use tracing::debug;

use crate::core::typechart::{multiplier, TypeChart};
use crate::game::action::ActionRequest;
use crate::game::state::{BattleId, Creature, UserId};
use crate::service::battle::BattleService;
use crate::service::error::BattleError;
use crate::service::ports::BattleStatus;

/// Pick the attack type with the highest effectiveness against the
/// defender. Ties keep the earliest of the attacker's types.
pub fn best_attack_type(
    chart: &TypeChart,
    attacker: &Creature,
    defender: &Creature,
) -> Option<String> {
    let mut best: Option<(&str, f64)> = None;
    for attack_type in &attacker.types {
        let eff = multiplier(chart, attack_type, &defender.types);
        match best {
            Some((_, best_eff)) if eff <= best_eff => {}
            _ => best = Some((attack_type, eff)),
        }
    }
    best.map(|(t, _)| t.to_lowercase())
}

impl BattleService {
    /// Play the bot's pending half-turns, up to `max_actions` submissions.
    ///
    /// Returns how many actions were submitted. Stops when the battle
    /// finishes, when the next half-turn is not the bot's, or when the
    /// budget runs out; the budget keeps a bot-vs-bot pairing from looping
    /// unboundedly in one call.
    pub async fn bot_autoplay(
        &self,
        battle_id: BattleId,
        bot_user: UserId,
        max_actions: usize,
    ) -> Result<usize, BattleError> {
        let mut submitted = 0;

        while submitted < max_actions {
            let row = self.store.load(battle_id).await?;
            let role = row.role_of(bot_user).ok_or(BattleError::NotParticipant)?;
            if row.status == BattleStatus::Finished || row.state.finished {
                break;
            }
            if row.state.next_actor != role {
                break;
            }

            let ctx = row.context();
            let attacker = ctx.active_creature(role, &row.state);
            let defender = ctx.active_creature(role.opponent(), &row.state);

            let request = match best_attack_type(&ctx.type_chart, attacker, defender) {
                Some(attack_type) => ActionRequest::attack(&attack_type),
                None => ActionRequest::of_kind("defend"),
            };

            let outcome = self.submit_turn(battle_id, bot_user, &request).await?;
            submitted += 1;
            if outcome.is_finished() {
                break;
            }
        }

        debug!(battle_id = %battle_id, bot_user, submitted, "bot autoplay done");
        Ok(submitted)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Stats;

    fn creature(types: &[&str]) -> Creature {
        Creature {
            id: 1,
            name: "creature".into(),
            types: types.iter().map(|t| t.to_string()).collect(),
            stats: Stats {
                hp: 40,
                attack: 50,
                defense: 40,
                speed: 60,
            },
        }
    }

    fn chart() -> TypeChart {
        let mut chart = TypeChart::new();
        chart.insert("fire".into(), [("grass".to_string(), 2.0)].into());
        chart.insert(
            "water".into(),
            [("grass".to_string(), 0.5), ("rock".to_string(), 2.0)].into(),
        );
        chart
    }

    #[test]
    fn picks_the_strongest_matchup() {
        let attacker = creature(&["water", "fire"]);
        let defender = creature(&["grass"]);

        assert_eq!(
            best_attack_type(&chart(), &attacker, &defender),
            Some("fire".into())
        );
    }

    #[test]
    fn tie_keeps_the_first_type() {
        let attacker = creature(&["fire", "water"]);
        let defender = creature(&["normal"]); // both neutral

        assert_eq!(
            best_attack_type(&chart(), &attacker, &defender),
            Some("fire".into())
        );
    }

    #[test]
    fn typeless_attacker_has_no_pick() {
        let attacker = creature(&[]);
        let defender = creature(&["grass"]);

        assert_eq!(best_attack_type(&chart(), &attacker, &defender), None);
    }
}
