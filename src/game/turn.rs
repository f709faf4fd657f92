//! Turn State Machine
//!
//! A turn is two half-turns resolved in initiative order. Initiative is
//! decided at the start of every turn from the current active creatures'
//! speeds, with an exact tie broken by a seeded coin flip at sub-seed
//! offset 0. After the second half-turn, lingering effects decay and the
//! next turn's initiative is resolved.

use crate::core::rng::{turn_seed, SeededRng};
use crate::game::resolver::decay_effects;
use crate::game::state::{
    BattleContext, BattleState, InitiativeDetail, InitiativeMethod, Phase, Role, SideState,
};

/// Decide which side acts first this turn.
///
/// Strict speed comparison; an exact tie consumes the turn's offset-0
/// sub-seed for a coin flip (0 favors side A). Half-turn resolution uses
/// offsets 1 and 2, so the flip never perturbs action rolls.
pub fn resolve_initiative(seed: i64, turn: u64, a_speed: i32, b_speed: i32) -> InitiativeDetail {
    let sub_seed = turn_seed(seed, turn, 0);

    if a_speed != b_speed {
        let winner = if a_speed > b_speed { Role::A } else { Role::B };
        return InitiativeDetail {
            seed: sub_seed,
            winner,
            method: InitiativeMethod::Speed,
            a_speed,
            b_speed,
            tiebreak: None,
        };
    }

    let flip = SeededRng::new(sub_seed).tiebreak();
    InitiativeDetail {
        seed: sub_seed,
        winner: if flip == 0 { Role::A } else { Role::B },
        method: InitiativeMethod::Tiebreak,
        a_speed,
        b_speed,
        tiebreak: Some(flip),
    }
}

/// Acting order with the initiative winner first.
#[inline]
pub fn order_for(winner: Role) -> [Role; 2] {
    [winner, winner.opponent()]
}

/// Opening state for a new battle: turn 0, first half pending, initiative
/// resolved from the lead creatures' speeds.
pub fn opening_state(ctx: &BattleContext) -> BattleState {
    let a = SideState::fresh(&ctx.team_a);
    let b = SideState::fresh(&ctx.team_b);

    let initiative = resolve_initiative(
        ctx.seed,
        0,
        ctx.team_a[a.active].stats.speed,
        ctx.team_b[b.active].stats.speed,
    );
    let order = order_for(initiative.winner);

    BattleState {
        turn: 0,
        phase: Phase::First,
        order,
        next_actor: order[0],
        initiative: Some(initiative),
        a,
        b,
        finished: false,
        winner: None,
        loser: None,
        finish_reason: None,
    }
}

/// Re-resolve initiative for the state's current turn from the active
/// creatures' speeds, overwriting order and next actor.
///
/// Also used to repair a state whose stored order predates the two-phase
/// schema.
pub fn reresolve_initiative(ctx: &BattleContext, state: &mut BattleState) {
    let initiative = resolve_initiative(
        ctx.seed,
        state.turn,
        ctx.active_creature(Role::A, state).stats.speed,
        ctx.active_creature(Role::B, state).stats.speed,
    );
    state.order = order_for(initiative.winner);
    state.next_actor = state.order[state.phase.index()];
    state.initiative = Some(initiative);
}

/// Advance the turn bookkeeping after one resolved half-turn.
///
/// First half: move to the second half, same turn. Second half: decay
/// effects on both sides, increment the turn counter, and resolve the new
/// turn's initiative. Finished states are left untouched.
pub fn advance(ctx: &BattleContext, state: &mut BattleState) {
    if state.finished {
        return;
    }
    match state.phase {
        Phase::First => {
            state.phase = Phase::Second;
            state.next_actor = state.order[1];
        }
        Phase::Second => {
            decay_effects(state);
            state.turn += 1;
            state.phase = Phase::First;
            reresolve_initiative(ctx, state);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::typechart::TypeChart;
    use crate::game::state::{Creature, Stats};

    fn creature(id: u32, speed: i32) -> Creature {
        Creature {
            id,
            name: format!("creature-{id}"),
            types: vec!["normal".into()],
            stats: Stats {
                hp: 40,
                attack: 50,
                defense: 40,
                speed,
            },
        }
    }

    fn ctx(a_speed: i32, b_speed: i32) -> BattleContext {
        BattleContext {
            seed: 99,
            type_chart: TypeChart::new(),
            team_a: vec![creature(1, a_speed)],
            team_b: vec![creature(2, b_speed)],
        }
    }

    #[test]
    fn faster_side_goes_first() {
        let detail = resolve_initiative(1, 0, 70, 50);
        assert_eq!(detail.winner, Role::A);
        assert_eq!(detail.method, InitiativeMethod::Speed);
        assert_eq!(detail.tiebreak, None);

        let detail = resolve_initiative(1, 0, 50, 70);
        assert_eq!(detail.winner, Role::B);
    }

    #[test]
    fn speed_tie_flips_a_deterministic_coin() {
        let first = resolve_initiative(42, 3, 60, 60);
        let again = resolve_initiative(42, 3, 60, 60);

        assert_eq!(first.method, InitiativeMethod::Tiebreak);
        assert_eq!(first, again);

        let flip = first.tiebreak.unwrap();
        assert!(flip <= 1);
        let expected = if flip == 0 { Role::A } else { Role::B };
        assert_eq!(first.winner, expected);
    }

    #[test]
    fn tiebreak_uses_offset_zero_sub_seed() {
        let detail = resolve_initiative(100, 5, 60, 60);
        assert_eq!(detail.seed, turn_seed(100, 5, 0));
    }

    #[test]
    fn some_seed_gives_each_side_the_tie() {
        let winners: Vec<Role> = (0..64)
            .map(|seed| resolve_initiative(seed, 0, 60, 60).winner)
            .collect();
        assert!(winners.contains(&Role::A));
        assert!(winners.contains(&Role::B));
    }

    #[test]
    fn opening_state_orders_by_lead_speed() {
        let state = opening_state(&ctx(80, 40));

        assert_eq!(state.turn, 0);
        assert_eq!(state.phase, Phase::First);
        assert_eq!(state.order, [Role::A, Role::B]);
        assert_eq!(state.next_actor, Role::A);
        assert!(!state.finished);
        assert_eq!(
            state.initiative.as_ref().map(|i| i.winner),
            Some(Role::A)
        );
    }

    #[test]
    fn advance_walks_both_phases() {
        let ctx = ctx(80, 40);
        let mut state = opening_state(&ctx);

        advance(&ctx, &mut state);
        assert_eq!(state.turn, 0);
        assert_eq!(state.phase, Phase::Second);
        assert_eq!(state.next_actor, Role::B);

        advance(&ctx, &mut state);
        assert_eq!(state.turn, 1);
        assert_eq!(state.phase, Phase::First);
        assert_eq!(state.next_actor, Role::A);
    }

    #[test]
    fn advance_decays_effects_at_turn_end() {
        let ctx = ctx(80, 40);
        let mut state = opening_state(&ctx);
        state.a.effects.atk_mod = 1.1;
        state.a.effects.atk_turns = 1;

        advance(&ctx, &mut state); // first half: no decay
        assert_eq!(state.a.effects.atk_turns, 1);

        advance(&ctx, &mut state); // turn end
        assert_eq!(state.a.effects.atk_turns, 0);
        assert_eq!(state.a.effects.atk_mod, 1.0);
    }

    #[test]
    fn advance_leaves_finished_state_alone() {
        let ctx = ctx(80, 40);
        let mut state = opening_state(&ctx);
        state.finish_decisive(Role::A);
        let before = state.clone();

        advance(&ctx, &mut state);
        assert_eq!(state, before);
    }

    #[test]
    fn initiative_follows_the_active_creature() {
        let ctx = BattleContext {
            seed: 7,
            type_chart: TypeChart::new(),
            team_a: vec![creature(1, 30), creature(2, 90)],
            team_b: vec![creature(3, 50)],
        };
        let mut state = opening_state(&ctx);
        assert_eq!(state.order, [Role::B, Role::A]);

        // After a switch the faster teammate takes initiative
        state.a.active = 1;
        state.phase = Phase::First;
        reresolve_initiative(&ctx, &mut state);
        assert_eq!(state.order, [Role::A, Role::B]);
        assert_eq!(state.next_actor, Role::A);
    }
}
