//! Resolves the ten candidate slots across the five pools.
//!
//! Three transforms run in sequence over a signed working vector, followed by
//! mandatory normalization back to non-negative integers summing to ten:
//!
//! 1. base lookup by [`BaseState`] ([`BASE_DISTRIBUTIONS`])
//! 2. level-gated strength boost (below level 15, plus the sub-persona boost)
//! 3. modifier deltas ([`MODIFIER_DELTAS`]) in [`Modifier`] declaration order
//!
//! Field order everywhere: confidence builders, skill development,
//! progressive challenge, engagement recovery, exploratory new.

use tracing::{debug, warn};

use crate::selection_engine::models::{
    BaseState, Modifier, PoolDistribution, UserProfile, UserState, TOTAL_SLOTS,
};

pub const BASE_DISTRIBUTIONS: [(BaseState, [u8; 5]); 8] = [
    (BaseState::NewUser,            [7, 2, 1, 0, 0]),
    (BaseState::SeverelyStruggling, [6, 2, 0, 0, 2]),
    (BaseState::Struggling,         [4, 3, 1, 0, 2]),
    (BaseState::FallingBack,        [3, 4, 2, 0, 1]),
    (BaseState::Stable,             [2, 4, 3, 0, 1]),
    (BaseState::Progressing,        [2, 3, 4, 0, 1]),
    (BaseState::Excelling,          [1, 2, 4, 3, 0]),
    (BaseState::ExpertDemanding,    [0, 1, 7, 2, 0]),
];

/// Signed deltas per modifier. Results never drop below zero.
pub const MODIFIER_DELTAS: [(Modifier, [i32; 5]); 5] = [
    (Modifier::ConfidenceCrisis, [2, 0, -2, 0, 0]),
    (Modifier::Disengaged,       [0, -1, 0, 2, 0]),
    (Modifier::PowerDependent,   [1, 0, 0, 0, 0]),
    (Modifier::Fatigued,         [1, 0, -2, 1, 0]),
    (Modifier::SessionDecline,   [0, -1, 0, 1, 0]),
];

/// Levels below this get the confidence-builder boost.
pub const STRENGTH_BOOST_BELOW_LEVEL: u32 = 15;

const LEVEL_BOOST_CONFIDENCE: i32 = 3;
const LEVEL_BOOST_CONFIDENCE_MAX: i32 = 8;
const LEVEL_BOOST_CHALLENGE_CUT: i32 = 2;
const PERSONA_BOOST_CONFIDENCE: i32 = 2;
const PERSONA_BOOST_CONFIDENCE_MAX: i32 = 9;
const PERSONA_SKILL_FLOOR: i32 = 1;

pub fn base_distribution(state: BaseState) -> PoolDistribution {
    BASE_DISTRIBUTIONS
        .iter()
        .find(|(s, _)| *s == state)
        .map(|(_, slots)| PoolDistribution::from_array(*slots))
        .unwrap_or(PoolDistribution::from_array([7, 2, 1, 0, 0]))
}

pub fn modifier_delta(modifier: Modifier) -> [i32; 5] {
    MODIFIER_DELTAS
        .iter()
        .find(|(m, _)| *m == modifier)
        .map(|(_, delta)| *delta)
        .unwrap_or([0; 5])
}

fn to_signed(distribution: PoolDistribution) -> [i32; 5] {
    distribution.as_array().map(i32::from)
}

/// Strength boost for early levels; `sub_persona` stacks a further boost.
pub fn apply_level_boost(slots: [i32; 5], level: u32, sub_persona: bool) -> [i32; 5] {
    let mut s = slots;
    if level < STRENGTH_BOOST_BELOW_LEVEL {
        s[0] = (s[0] + LEVEL_BOOST_CONFIDENCE).min(LEVEL_BOOST_CONFIDENCE_MAX);
        s[2] = (s[2] - LEVEL_BOOST_CHALLENGE_CUT).max(0);
        if sub_persona {
            s[0] = (s[0] + PERSONA_BOOST_CONFIDENCE).min(PERSONA_BOOST_CONFIDENCE_MAX);
            s[1] = (s[1] - 1).max(PERSONA_SKILL_FLOOR);
        }
    }
    s
}

pub fn apply_modifiers(slots: [i32; 5], state: &UserState) -> [i32; 5] {
    let mut s = slots;
    for modifier in state.modifiers.iter() {
        let delta = modifier_delta(modifier);
        for (slot, d) in s.iter_mut().zip(delta) {
            *slot = (*slot + d).max(0);
        }
    }
    s
}

/// Rescale to exactly [`TOTAL_SLOTS`]: proportional floor, then one extra slot
/// each to the heaviest categories (earlier field wins ties).
///
/// `None` when the input has no positive weight to scale.
pub fn normalize(slots: [i32; 5]) -> Option<PoolDistribution> {
    let weights = slots.map(|v| v.max(0) as u32);
    let total: u32 = weights.iter().sum();
    if total == 0 {
        return None;
    }

    let target = u32::from(TOTAL_SLOTS);
    let mut out = weights.map(|w| w * target / total);
    let assigned: u32 = out.iter().sum();
    let mut remaining = target - assigned;

    let mut order: Vec<usize> = (0..5).filter(|&i| weights[i] > 0).collect();
    order.sort_by(|&a, &b| weights[b].cmp(&weights[a]).then(a.cmp(&b)));
    // Fractional parts sum to less than the number of weighted categories,
    // so a single pass always suffices.
    for &i in &order {
        if remaining == 0 {
            break;
        }
        out[i] += 1;
        remaining -= 1;
    }

    Some(PoolDistribution::from_array(out.map(|v| v as u8)))
}

/// Full resolution for one request.
pub fn resolve(state: &UserState, profile: &UserProfile, sub_persona: bool) -> PoolDistribution {
    let level = profile.level();
    let base = base_distribution(state.base);
    let boosted = apply_level_boost(to_signed(base), level, sub_persona);
    let modified = apply_modifiers(boosted, state);

    match normalize(modified) {
        Some(distribution) => {
            debug!(
                user_state = %state,
                level,
                sub_persona,
                base = %base,
                resolved = %distribution,
                "resolved pool distribution"
            );
            distribution
        }
        None => {
            warn!(
                user_state = %state,
                ?modified,
                "degenerate pool distribution, using new_user base"
            );
            base_distribution(BaseState::NewUser)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection_engine::models::ModifierSet;

    fn state(base: BaseState, modifiers: &[Modifier]) -> UserState {
        UserState { base, modifiers: modifiers.iter().copied().collect::<ModifierSet>() }
    }

    fn profile_at_level(level: u32) -> UserProfile {
        UserProfile { high_score: (level - 1) * 30, ..UserProfile::conservative_default() }
    }

    #[test]
    fn every_base_distribution_sums_to_ten() {
        for state in BaseState::ALL {
            assert_eq!(base_distribution(state).total(), 10, "{state}");
        }
    }

    #[test]
    fn new_user_base_is_seven_two_one() {
        assert_eq!(base_distribution(BaseState::NewUser).as_array(), [7, 2, 1, 0, 0]);
    }

    #[test]
    fn stable_user_below_level_fifteen_gets_strength_boost() {
        let d = resolve(&state(BaseState::Stable, &[]), &profile_at_level(7), false);
        assert_eq!(d.as_array(), [5, 4, 1, 0, 0]);
    }

    #[test]
    fn no_boost_from_level_fifteen() {
        let d = resolve(&state(BaseState::Stable, &[]), &profile_at_level(15), false);
        assert_eq!(d.as_array(), [2, 4, 3, 0, 1]);
    }

    #[test]
    fn sub_persona_adds_five_confidence_clamped_at_nine() {
        let boosted = apply_level_boost(to_signed(base_distribution(BaseState::Stable)), 3, true);
        assert_eq!(boosted[0], 2 + 5);
        // 4 after the level boost, minus one.
        assert_eq!(boosted[1], 3);

        let boosted = apply_level_boost(to_signed(base_distribution(BaseState::NewUser)), 3, true);
        assert_eq!(boosted, [9, 1, 0, 0, 0]);
    }

    #[test]
    fn sub_persona_skill_floor_is_one() {
        let boosted = apply_level_boost([1, 1, 3, 0, 5], 1, true);
        assert_eq!(boosted[1], 1);
    }

    #[test]
    fn sub_persona_ignored_from_level_fifteen() {
        let base = to_signed(base_distribution(BaseState::Stable));
        assert_eq!(apply_level_boost(base, 15, true), base);
    }

    #[test]
    fn modifier_deltas_never_go_negative() {
        let crisis = state(BaseState::Stable, &[Modifier::ConfidenceCrisis]);
        let s = apply_modifiers([0, 0, 1, 0, 0], &crisis);
        assert_eq!(s, [2, 0, 0, 0, 0]);

        let s = apply_modifiers(
            [3, 1, 2, 0, 4],
            &state(BaseState::Stable, &[Modifier::Disengaged, Modifier::SessionDecline]),
        );
        assert_eq!(s, [3, 0, 2, 3, 4]);
    }

    #[test]
    fn disengaged_shifts_toward_engagement_recovery() {
        let plain = resolve(&state(BaseState::Excelling, &[]), &profile_at_level(20), false);
        let disengaged = resolve(
            &state(BaseState::Excelling, &[Modifier::Disengaged]),
            &profile_at_level(20),
            false,
        );
        assert!(disengaged.engagement_recovery > plain.engagement_recovery);
        assert_eq!(disengaged.total(), 10);
    }

    #[test]
    fn normalize_ties_favor_heavier_then_earlier() {
        // 11 slots: floors {4,3,0,0,0}, extras go to 5, 4, then the first 1.
        assert_eq!(normalize([5, 4, 1, 0, 1]).map(|d| d.as_array()), Some([5, 4, 1, 0, 0]));
        // Under-full vector is scaled up.
        assert_eq!(normalize([1, 1, 0, 0, 0]).map(|d| d.as_array()), Some([5, 5, 0, 0, 0]));
        assert_eq!(normalize([1, 0, 0, 0, 0]).map(|d| d.as_array()), Some([10, 0, 0, 0, 0]));
    }

    #[test]
    fn normalize_rejects_zero_vector() {
        assert_eq!(normalize([0, 0, 0, 0, 0]), None);
    }

    #[test]
    fn heavily_modified_struggling_still_sums_to_ten() {
        let s = state(
            BaseState::Struggling,
            &[
                Modifier::ConfidenceCrisis,
                Modifier::Fatigued,
                Modifier::PowerDependent,
                Modifier::SessionDecline,
            ],
        );
        let d = resolve(&s, &profile_at_level(2), false);
        assert_eq!(d.total(), 10);
        assert!(d.confidence_builders >= 6);
        assert_eq!(d.progressive_challenge, 0);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn any_base() -> impl Strategy<Value = BaseState> {
            (0usize..8).prop_map(|i| BaseState::ALL[i])
        }

        proptest! {
            #[test]
            fn resolved_distribution_always_sums_to_ten(
                base in any_base(),
                flags in proptest::collection::vec(any::<bool>(), 5),
                high_score in 0u32..1000,
                sub_persona in any::<bool>(),
            ) {
                let all = [
                    Modifier::ConfidenceCrisis,
                    Modifier::Disengaged,
                    Modifier::PowerDependent,
                    Modifier::Fatigued,
                    Modifier::SessionDecline,
                ];
                let modifiers: ModifierSet = all
                    .iter()
                    .zip(&flags)
                    .filter(|(_, on)| **on)
                    .map(|(m, _)| *m)
                    .collect();
                let state = UserState { base, modifiers };
                let profile = UserProfile { high_score, ..UserProfile::conservative_default() };
                let d = resolve(&state, &profile, sub_persona);
                prop_assert_eq!(d.total(), 10);
            }

            #[test]
            fn normalize_sums_to_ten_for_any_weights(slots in proptest::array::uniform5(0i32..40)) {
                if let Some(d) = normalize(slots) {
                    prop_assert_eq!(d.total(), 10);
                } else {
                    prop_assert!(slots.iter().all(|&v| v == 0));
                }
            }
        }
    }
}
