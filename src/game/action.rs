//! Actions
//!
//! The five action kinds as a tagged union, plus normalization of raw
//! submissions. Raw actions arrive as a loose shape from the transport
//! layer; normalization validates the kind, attack-type ownership, and
//! switch legality before anything touches the resolver, so an invalid
//! submission never mutates state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::state::{BattleContext, BattleState, Role};

/// A validated action, ready for the resolver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    /// Attack with one of the acting creature's own types.
    Attack {
        /// Attack type, lowercase, owned by the acting creature
        attack_type: String,
    },
    /// Halve the next two incoming hits.
    Defend,
    /// Multiply own attack modifier by 1.1 for two turns.
    Buff,
    /// Multiply the opponent's attack modifier by 0.9 for two turns.
    Debuff,
    /// Swap the active creature.
    Switch {
        /// Team slot to switch to
        slot: usize,
    },
}

/// Raw action as submitted by a participant, before validation.
///
/// Kind defaults to "attack"; an attack without an explicit type uses the
/// acting creature's first type. Switches may address the target by
/// creature id or by team slot.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ActionRequest {
    /// Action kind ("attack", "defend", "buff", "debuff", "switch")
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Attack type for attack actions
    pub attack_type: Option<String>,
    /// Switch target by catalog id
    pub creature_id: Option<u32>,
    /// Switch target by team slot
    pub slot: Option<usize>,
}

impl ActionRequest {
    /// Shorthand for an attack with an explicit type.
    pub fn attack(attack_type: &str) -> Self {
        Self {
            kind: Some("attack".into()),
            attack_type: Some(attack_type.into()),
            ..Self::default()
        }
    }

    /// Shorthand for a bare kind ("defend", "buff", "debuff").
    pub fn of_kind(kind: &str) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    /// Shorthand for a switch to a team slot.
    pub fn switch_to(slot: usize) -> Self {
        Self {
            kind: Some("switch".into()),
            slot: Some(slot),
            ..Self::default()
        }
    }
}

/// Why a raw action was rejected. No state change has happened; the caller
/// may retry with corrected input.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Unknown action kind.
    #[error("unsupported action type \"{0}\"")]
    UnsupportedKind(String),

    /// Attack type not owned by the acting creature.
    #[error("invalid attack type \"{0}\" for this creature")]
    ForeignAttackType(String),

    /// Attack requested but the creature has no types and none was given.
    #[error("attack requires an attack type")]
    MissingAttackType,

    /// Switch on a single-creature team.
    #[error("no other creature to switch to")]
    NoSwitchTarget,

    /// Switch without a target.
    #[error("switch requires creature_id or slot")]
    SwitchTargetRequired,

    /// Switch target outside the team.
    #[error("invalid switch target")]
    SwitchOutOfRange,

    /// Switch to the creature already fighting.
    #[error("already active")]
    AlreadyActive,

    /// Switch to a fainted creature.
    #[error("cannot switch to a fainted creature")]
    TargetFainted,
}

/// Normalize and validate a raw submission against the battle context and
/// current state.
pub fn normalize(
    req: &ActionRequest,
    ctx: &BattleContext,
    role: Role,
    state: &BattleState,
) -> Result<Action, ActionError> {
    let kind = req
        .kind
        .as_deref()
        .unwrap_or("attack")
        .trim()
        .to_lowercase();

    match kind.as_str() {
        "defend" => Ok(Action::Defend),
        "buff" => Ok(Action::Buff),
        "debuff" => Ok(Action::Debuff),
        "switch" => normalize_switch(req, ctx, role, state),
        "attack" => normalize_attack(req, ctx, role, state),
        other => Err(ActionError::UnsupportedKind(other.to_string())),
    }
}

fn normalize_attack(
    req: &ActionRequest,
    ctx: &BattleContext,
    role: Role,
    state: &BattleState,
) -> Result<Action, ActionError> {
    let attacker = ctx.active_creature(role, state);

    let attack_type = match &req.attack_type {
        Some(t) => t.trim().to_lowercase(),
        None => attacker
            .types
            .first()
            .ok_or(ActionError::MissingAttackType)?
            .to_lowercase(),
    };
    if attack_type.is_empty() {
        return Err(ActionError::MissingAttackType);
    }

    let owned = attacker
        .types
        .iter()
        .any(|t| t.to_lowercase() == attack_type);
    if !owned {
        return Err(ActionError::ForeignAttackType(attack_type));
    }

    Ok(Action::Attack { attack_type })
}

fn normalize_switch(
    req: &ActionRequest,
    ctx: &BattleContext,
    role: Role,
    state: &BattleState,
) -> Result<Action, ActionError> {
    let team = ctx.team(role);
    if team.len() < 2 {
        return Err(ActionError::NoSwitchTarget);
    }

    let target = if let Some(creature_id) = req.creature_id {
        team.iter()
            .position(|c| c.id == creature_id)
            .ok_or(ActionError::SwitchOutOfRange)?
    } else if let Some(slot) = req.slot {
        slot
    } else {
        return Err(ActionError::SwitchTargetRequired);
    };

    if target >= team.len() {
        return Err(ActionError::SwitchOutOfRange);
    }

    let side = state.side(role);
    if target == side.active {
        return Err(ActionError::AlreadyActive);
    }
    // Hp entry may be missing when the stored state predates the current
    // team schema; the resolver's reconcile step covers that case.
    if let Some(&hp) = side.hp.get(target) {
        if hp <= 0 {
            return Err(ActionError::TargetFainted);
        }
    }

    Ok(Action::Switch { slot: target })
}

// =============================================================================
// TESTS
// =============================================================================
