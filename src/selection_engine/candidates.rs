//! Candidate generation: one producer request per distribution slot.
//!
//! Generation runs in two phases. [`plan_slots`] is synchronous and does all
//! of the random draws up front, so the injected RNG is never held across an
//! await. [`generate`] then fans every slot out concurrently and joins them;
//! each producer call is bounded by the configured timeout.
//!
//! Every slot walks the same fallback ladder: the pool's preferred type at the
//! pool target, then a few other enabled types at that target, then one
//! random enabled type with no target at all. Under a difficulty cap, a
//! puzzle above the cap counts as a miss. A slot whose ladder comes back
//! empty is skipped.

use futures::future::join_all;
use rand::{seq::SliceRandom, Rng};
use tracing::{debug, warn};

use crate::selection_engine::{
    config::{EngineConfig, SafetyConfig},
    helpers::{clamp01, rotated},
    models::{
        AttemptOutcome, AttemptStage, BaseState, ConstraintLevel, Pool, PoolDistribution,
        ProduceAttempt, PuzzleDna, RotationCursor, UserProfile, UserState,
    },
    producer::{ProduceRequest, PuzzleProducer},
};

/// Accuracy below which an attempted type counts as weak.
const WEAK_TYPE_BELOW: f64 = 0.6;

/// Attempts below which a type still counts as exploratory.
const RARE_TYPE_BELOW: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct SlotPlan {
    pub pool: Pool,
    pub preferred: String,
    pub alternates: Vec<String>,
    pub random_type: Option<String>,
    pub target: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Position in generation order.
    pub index: usize,
    pub pool: Pool,
    pub stage: AttemptStage,
    pub puzzle: PuzzleDna,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub candidates: Vec<Candidate>,
    pub attempts: Vec<ProduceAttempt>,
}

/// Hard difficulty cap in force for a base state, if any.
pub fn difficulty_cap(base: BaseState, safety: &SafetyConfig) -> Option<f64> {
    match base {
        BaseState::NewUser => Some(safety.new_user_cap),
        BaseState::Struggling | BaseState::SeverelyStruggling => Some(safety.struggling_cap),
        _ => None,
    }
}

/// Pool target relative to the learner's current skill.
pub fn pool_target(pool: Pool, skill: f64) -> f64 {
    let offset = match pool {
        Pool::ConfidenceBuilders   => -0.20,
        Pool::SkillDevelopment     => 0.0,
        Pool::ProgressiveChallenge => 0.15,
        Pool::EngagementRecovery   => -0.10,
        Pool::ExploratoryNew       => -0.05,
    };
    clamp01(skill + offset)
}

/// Types a pool prefers, best first. Falls back to the rotation order when
/// the profile has nothing matching the pool's intent.
pub fn pool_types(pool: Pool, profile: &UserProfile, rotation: &[String]) -> Vec<String> {
    let attempted: Vec<(&String, f64, u32)> = rotation
        .iter()
        .filter_map(|t| profile.type_stats(t).map(|s| (t, s.accuracy, s.total_attempts)))
        .filter(|&(_, _, attempts)| attempts > 0)
        .collect();

    let picked: Vec<(&String, f64, u32)> = match pool {
        Pool::ConfidenceBuilders => {
            let mut v = attempted;
            v.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            v
        }
        Pool::SkillDevelopment => {
            let mut v: Vec<_> = attempted
                .into_iter()
                .filter(|&(_, acc, _)| acc < WEAK_TYPE_BELOW)
                .collect();
            v.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
            v
        }
        Pool::EngagementRecovery => {
            let mut v = attempted;
            v.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(b.0)));
            v
        }
        Pool::ProgressiveChallenge => Vec::new(),
        Pool::ExploratoryNew => {
            let attempts_of = |t: &String| profile.type_stats(t).map_or(0, |s| s.total_attempts);
            let mut v: Vec<_> = rotation
                .iter()
                .filter(|t| attempts_of(*t) < RARE_TYPE_BELOW)
                .map(|t| (t, 0.0, attempts_of(t)))
                .collect();
            // Unattempted types first; rotation order otherwise (stable sort).
            v.sort_by_key(|&(_, _, attempts)| attempts > 0);
            v
        }
    };

    if picked.is_empty() {
        return rotation.to_vec();
    }
    picked.into_iter().map(|(t, _, _)| t.clone()).collect()
}

/// Lay out every slot of `distribution` with its full fallback ladder.
pub fn plan_slots<R: Rng>(
    distribution: &PoolDistribution,
    profile: &UserProfile,
    state: &UserState,
    cursor: &RotationCursor,
    config: &EngineConfig,
    rng: &mut R,
) -> Vec<SlotPlan> {
    let rotation = rotated(&config.enabled_types, cursor.position);
    let cap = difficulty_cap(state.base, &config.safety);
    let mut plans = Vec::with_capacity(distribution.total() as usize);

    for pool in Pool::ALL {
        let slots = usize::from(distribution.get(pool));
        if slots == 0 {
            continue;
        }
        let types = pool_types(pool, profile, &rotation);
        if types.is_empty() {
            continue;
        }
        let mut target = pool_target(pool, profile.current_skill_level);
        if let Some(cap) = cap {
            target = target.min(cap);
        }

        for slot in 0..slots {
            let preferred = types[slot % types.len()].clone();
            let alternates: Vec<String> = rotation
                .iter()
                .filter(|t| **t != preferred)
                .take(config.max_alternate_types)
                .cloned()
                .collect();
            let random_type = config.enabled_types.choose(rng).cloned();
            plans.push(SlotPlan { pool, preferred, alternates, random_type, target });
        }
    }

    debug!(slots = plans.len(), cap = ?cap, "planned candidate slots");
    plans
}

/// Fan out every planned slot and join them.
///
/// With a `cap` in force a slot treats an over-cap puzzle as a miss and keeps
/// walking its ladder. Only when the whole ladder is spent does the slot fall
/// back to the first over-cap puzzle it saw, leaving the final relaxation to
/// [`apply_safety`].
pub async fn generate<P: PuzzleProducer>(
    producer: &P,
    plans: &[SlotPlan],
    recent_patterns: &[String],
    cap: Option<f64>,
    config: &EngineConfig,
) -> Generation {
    let slots = plans
        .iter()
        .map(|plan| run_slot(producer, plan, recent_patterns, cap, config));
    let results = join_all(slots).await;

    let mut generation = Generation::default();
    for (plan, (produced, attempts)) in plans.iter().zip(results) {
        generation.attempts.extend(attempts);
        if let Some((stage, puzzle)) = produced {
            let index = generation.candidates.len();
            generation.candidates.push(Candidate { index, pool: plan.pool, stage, puzzle });
        }
    }

    debug!(
        produced = generation.candidates.len(),
        attempts = generation.attempts.len(),
        "candidate generation finished"
    );
    generation
}

async fn run_slot<P: PuzzleProducer>(
    producer: &P,
    plan: &SlotPlan,
    recent_patterns: &[String],
    cap: Option<f64>,
    config: &EngineConfig,
) -> (Option<(AttemptStage, PuzzleDna)>, Vec<ProduceAttempt>) {
    let ladder = std::iter::once((AttemptStage::Preferred, &plan.preferred, Some(plan.target)))
        .chain(plan.alternates.iter().map(|t| (AttemptStage::Alternate, t, Some(plan.target))))
        .chain(plan.random_type.iter().map(|t| (AttemptStage::Random, t, None)));

    let mut attempts = Vec::new();
    let mut over_cap: Option<(AttemptStage, PuzzleDna)> = None;

    for (stage, puzzle_type, target_difficulty) in ladder {
        let request = ProduceRequest {
            puzzle_type: puzzle_type.clone(),
            target_difficulty,
            recent_patterns: recent_patterns.to_vec(),
        };
        let timeout = config.producer_timeout();
        let outcome = match tokio::time::timeout(timeout, producer.produce(request)).await {
            Ok(Some(puzzle)) if !config.is_enabled(&puzzle.puzzle_type) => {
                debug!(
                    pool = %plan.pool,
                    returned = %puzzle.puzzle_type,
                    "producer returned a disabled type"
                );
                AttemptOutcome::Disabled
            }
            Ok(Some(puzzle)) if exceeds(cap, puzzle.discovered_difficulty) => {
                debug!(
                    pool = %plan.pool,
                    puzzle_type = %puzzle_type,
                    difficulty = puzzle.discovered_difficulty,
                    "candidate over difficulty cap, trying next type"
                );
                over_cap.get_or_insert((stage, puzzle));
                AttemptOutcome::OverCap
            }
            Ok(Some(puzzle)) => {
                attempts.push(ProduceAttempt {
                    pool: plan.pool,
                    puzzle_type: puzzle_type.clone(),
                    target_difficulty,
                    stage,
                    outcome: AttemptOutcome::Produced,
                });
                return (Some((stage, puzzle)), attempts);
            }
            Ok(None) => AttemptOutcome::CannotProduce,
            Err(_) => {
                warn!(pool = %plan.pool, puzzle_type = %puzzle_type, "producer timed out");
                AttemptOutcome::TimedOut
            }
        };
        attempts.push(ProduceAttempt {
            pool: plan.pool,
            puzzle_type: puzzle_type.clone(),
            target_difficulty,
            stage,
            outcome,
        });
    }

    if over_cap.is_some() {
        debug!(pool = %plan.pool, "ladder exhausted under cap, keeping over-cap candidate");
    } else {
        debug!(
            pool = %plan.pool,
            preferred = %plan.preferred,
            "slot skipped, fallback ladder exhausted"
        );
    }
    (over_cap, attempts)
}

fn exceeds(cap: Option<f64>, difficulty: f64) -> bool {
    cap.is_some_and(|cap| difficulty > cap)
}

/// Keep the candidates admissible under the cap, relaxing step by step:
/// easy variants under the cap, then anything under the cap, then anything.
///
/// Over-cap candidates only reach this point from slots whose whole ladder
/// failed to produce anything under the cap.
pub fn apply_safety(
    candidates: &[Candidate],
    cap: Option<f64>,
) -> (Vec<Candidate>, ConstraintLevel) {
    let Some(cap) = cap else {
        return (candidates.to_vec(), ConstraintLevel::Strict);
    };

    let under_cap: Vec<Candidate> = candidates
        .iter()
        .filter(|c| c.puzzle.discovered_difficulty <= cap)
        .cloned()
        .collect();
    let easy: Vec<Candidate> = under_cap
        .iter()
        .filter(|c| c.puzzle.is_easy_variant())
        .cloned()
        .collect();

    if !easy.is_empty() {
        (easy, ConstraintLevel::Strict)
    } else if !under_cap.is_empty() {
        (under_cap, ConstraintLevel::CapOnly)
    } else {
        (candidates.to_vec(), ConstraintLevel::Uncapped)
    }
}
