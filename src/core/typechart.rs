//! Type-Effectiveness Table
//!
//! Pure lookup of attack-type vs defender-type damage multipliers. The
//! chart is fetched once per battle from the external species-data service,
//! embedded in the battle row, and never re-fetched mid-battle.

use std::collections::BTreeMap;

/// Multipliers for one attack type: defender type -> multiplier.
///
/// Values are expected to be one of {0, 0.5, 1, 2} but this is not
/// enforced; the chart is external data.
pub type TypeRow = BTreeMap<String, f64>;

/// Full chart: attack type -> defender type -> multiplier.
///
/// BTreeMap keeps key order stable so embedded charts serialize
/// canonically inside signed replays.
pub type TypeChart = BTreeMap<String, TypeRow>;

/// Combined multiplier of an attack type against a defender's types.
///
/// The result is the product of the per-type multipliers; a missing entry
/// counts as 1.0. Lookups are case-insensitive.
pub fn multiplier(chart: &TypeChart, attack_type: &str, defender_types: &[String]) -> f64 {
    let attack_type = attack_type.to_lowercase();
    let row = chart.get(&attack_type);

    let mut mult = 1.0;
    for defender_type in defender_types {
        let per_type = row
            .and_then(|r| r.get(&defender_type.to_lowercase()))
            .copied()
            .unwrap_or(1.0);
        mult *= per_type;
    }
    mult
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chart(entries: &[(&str, &str, f64)]) -> TypeChart {
        let mut chart = TypeChart::new();
        for (atk, def, mult) in entries {
            chart
                .entry(atk.to_string())
                .or_default()
                .insert(def.to_string(), *mult);
        }
        chart
    }

    #[test]
    fn known_matchups() {
        let chart = chart(&[
            ("fire", "grass", 2.0),
            ("fire", "water", 0.5),
            ("fire", "fire", 0.5),
            ("electric", "ground", 0.0),
        ]);

        assert_eq!(multiplier(&chart, "fire", &["grass".into()]), 2.0);
        assert_eq!(multiplier(&chart, "fire", &["water".into()]), 0.5);
        assert_eq!(multiplier(&chart, "electric", &["ground".into()]), 0.0);
    }

    #[test]
    fn missing_entries_default_to_neutral() {
        let chart = chart(&[("fire", "grass", 2.0)]);

        assert_eq!(multiplier(&chart, "fire", &["rock".into()]), 1.0);
        assert_eq!(multiplier(&chart, "psychic", &["grass".into()]), 1.0);
        assert_eq!(multiplier(&chart, "fire", &[]), 1.0);
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let chart = chart(&[("fire", "grass", 2.0)]);

        assert_eq!(multiplier(&chart, "FIRE", &["Grass".into()]), 2.0);
        assert_eq!(multiplier(&chart, "Fire", &["GRASS".into()]), 2.0);
    }

    #[test]
    fn dual_types_multiply() {
        let chart = chart(&[("fire", "grass", 2.0), ("fire", "water", 0.5)]);

        let combined = multiplier(&chart, "fire", &["grass".into(), "water".into()]);
        assert_eq!(combined, 1.0);
    }

    proptest! {
        // multiplier(attack, [t1, t2]) == multiplier(attack, [t1]) * multiplier(attack, [t2])
        #[test]
        fn product_law(m1 in prop_oneof![Just(0.0), Just(0.5), Just(1.0), Just(2.0)],
                       m2 in prop_oneof![Just(0.0), Just(0.5), Just(1.0), Just(2.0)]) {
            let chart = chart(&[("fire", "grass", m1), ("fire", "water", m2)]);
            let both = multiplier(&chart, "fire", &["grass".into(), "water".into()]);
            let separate = multiplier(&chart, "fire", &["grass".into()])
                * multiplier(&chart, "fire", &["water".into()]);
            prop_assert_eq!(both, separate);
        }
    }
}
