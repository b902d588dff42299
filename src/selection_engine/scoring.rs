//! Multi-criteria candidate scoring and the final argmax.
//!
//! `score = 0.4·success + 0.3·engagement + 0.2·strategic + 0.1·variety`, every
//! term in [0,1] before weighting, plus additive state bonuses.

use crate::selection_engine::{
    candidates::Candidate,
    config::ScoringConfig,
    distribution::STRENGTH_BOOST_BELOW_LEVEL,
    helpers::{clamp01, neutral_or, NEUTRAL, SCORE_EPSILON},
    models::{
        AttemptStage, CognitiveProfile, ConstraintLevel, Modifier, PoolDistribution, PuzzleDna,
        RotationCursor, ScoreBreakdown, ScoredCandidate, UserProfile, UserState,
    },
};

/// Prior attempts needed before type history feeds the success prediction.
pub const TYPE_HISTORY_MIN_ATTEMPTS: u32 = 3;

/// Offset above current skill that counts as an ideal stretch.
const STRETCH_OFFSET: f64 = 0.1;

pub const COMPONENT_NAMES: [&str; 4] = [
    "predicted_success",
    "predicted_engagement",
    "strategic_value",
    "variety_bonus",
];

pub struct ScoringInput<'a> {
    pub profile: &'a UserProfile,
    pub state: &'a UserState,
    pub cursor: &'a RotationCursor,
    pub config: &'a ScoringConfig,
}

/// Confidence-damped mean of the cognitive dimensions a puzzle targets.
///
/// `None` when no target names a known dimension.
pub fn skill_match(targets: &[String], cognitive: &CognitiveProfile) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for score in targets.iter().filter_map(|t| cognitive.dimension(t)) {
        let confidence = clamp01(score.confidence);
        sum += NEUTRAL + (clamp01(score.value) - NEUTRAL) * confidence;
        count += 1;
    }
    (count > 0).then(|| sum / count as f64)
}

fn type_history_accuracy(puzzle: &PuzzleDna, profile: &UserProfile) -> f64 {
    profile
        .type_stats(&puzzle.puzzle_type)
        .filter(|s| s.total_attempts >= TYPE_HISTORY_MIN_ATTEMPTS)
        .map_or(0.0, |s| clamp01(s.accuracy))
}

pub fn predict_success(puzzle: &PuzzleDna, profile: &UserProfile) -> f64 {
    let distance = (puzzle.discovered_difficulty - profile.current_skill_level).abs();
    let proximity = clamp01(1.0 - distance);
    let skill = neutral_or(skill_match(&puzzle.skill_targets, &profile.cognitive_profile));
    let history = type_history_accuracy(puzzle, profile);
    let engagement = clamp01(puzzle.engagement_potential);

    clamp01(0.5 + 0.4 * proximity + 0.3 * skill + 0.2 * history + 0.1 * engagement)
}

pub fn predict_engagement(puzzle: &PuzzleDna, profile: &UserProfile) -> f64 {
    let distance = (puzzle.discovered_difficulty - profile.preferred_difficulty).abs();
    let preference_fit = clamp01(1.0 - distance);
    clamp01(0.7 * clamp01(puzzle.engagement_potential) + 0.3 * preference_fit)
}

/// Growth value: weak types and puzzles just above current skill score high.
pub fn strategic_value(puzzle: &PuzzleDna, profile: &UserProfile) -> f64 {
    let weakness = neutral_or(
        profile
            .type_stats(&puzzle.puzzle_type)
            .map(|s| 1.0 - clamp01(s.accuracy)),
    );
    let ideal = profile.current_skill_level + STRETCH_OFFSET;
    let stretch = clamp01(1.0 - 2.0 * (puzzle.discovered_difficulty - ideal).abs());
    clamp01(0.5 * weakness + 0.5 * stretch)
}

pub fn variety_bonus(puzzle: &PuzzleDna, cursor: &RotationCursor) -> f64 {
    if cursor.last_type.as_deref() == Some(puzzle.puzzle_type.as_str()) {
        0.0
    } else if cursor.recent.iter().any(|t| *t == puzzle.puzzle_type) {
        0.5
    } else {
        1.0
    }
}

pub fn state_bonus(puzzle: &PuzzleDna, input: &ScoringInput<'_>) -> f64 {
    let cfg = input.config;
    let mut bonus = 0.0;

    if input.profile.level() < STRENGTH_BOOST_BELOW_LEVEL
        && input.profile.strongest_type() == Some(puzzle.puzzle_type.as_str())
    {
        bonus += cfg.strength_bonus;
    }
    if input.state.has(Modifier::Disengaged) {
        bonus += cfg.engagement_bonus * clamp01(puzzle.engagement_potential);
    }
    if input.state.base.is_struggling() {
        bonus += cfg.confidence_bonus * (1.0 - clamp01(puzzle.discovered_difficulty));
    }
    bonus
}

pub fn score_candidate(candidate: &Candidate, input: &ScoringInput<'_>) -> ScoredCandidate {
    let puzzle = &candidate.puzzle;
    let cfg = input.config;
    let breakdown = ScoreBreakdown {
        predicted_success: predict_success(puzzle, input.profile),
        predicted_engagement: predict_engagement(puzzle, input.profile),
        strategic_value: strategic_value(puzzle, input.profile),
        variety_bonus: variety_bonus(puzzle, input.cursor),
    };
    let weighted = [
        cfg.success_weight * breakdown.predicted_success,
        cfg.engagement_weight * breakdown.predicted_engagement,
        cfg.strategic_weight * breakdown.strategic_value,
        cfg.variety_weight * breakdown.variety_bonus,
    ];
    let bonus = state_bonus(puzzle, input);
    let total = weighted.iter().sum::<f64>() + bonus;

    ScoredCandidate {
        index: candidate.index,
        pool: candidate.pool,
        stage: candidate.stage,
        puzzle: puzzle.clone(),
        breakdown,
        weighted,
        bonus,
        total,
    }
}

/// Argmax over totals. Ties go to the pool with the larger distribution
/// share, then to the earliest generated candidate.
pub fn select<'a>(
    scored: &'a [ScoredCandidate],
    distribution: &PoolDistribution,
) -> Option<&'a ScoredCandidate> {
    let mut best: Option<&ScoredCandidate> = None;
    for candidate in scored {
        let replace = match best {
            None => true,
            Some(current) => {
                let diff = candidate.total - current.total;
                if diff > SCORE_EPSILON {
                    true
                } else if diff < -SCORE_EPSILON {
                    false
                } else {
                    let share = distribution.get(candidate.pool);
                    let current_share = distribution.get(current.pool);
                    share > current_share
                        || (share == current_share && candidate.index < current.index)
                }
            }
        };
        if replace {
            best = Some(candidate);
        }
    }
    best
}

/// The two largest weighted components, largest first.
pub fn top_components(scored: &ScoredCandidate) -> [(&'static str, f64); 2] {
    let mut ranked: Vec<(&'static str, f64)> =
        COMPONENT_NAMES.iter().copied().zip(scored.weighted).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    [ranked[0], ranked[1]]
}

/// Human-readable trail naming pool, base state and top two components.
pub fn reasoning(
    winner: &ScoredCandidate,
    state: &UserState,
    constraint_level: ConstraintLevel,
    cap: Option<f64>,
) -> String {
    let [(first, first_value), (second, second_value)] = top_components(winner);
    let mut text = format!(
        "Selected {} ({}, difficulty {:.2}) from pool {} for base state {}; \
         top components: {} {:.3}, {} {:.3}; total score {:.3}",
        winner.puzzle.puzzle_type,
        winner.puzzle.puzzle_subtype,
        winner.puzzle.discovered_difficulty,
        winner.pool,
        state.base,
        first,
        first_value,
        second,
        second_value,
        winner.total,
    );
    if !state.modifiers.is_empty() {
        let modifiers: Vec<String> = state.modifiers.iter().map(|m| m.to_string()).collect();
        text.push_str(&format!("; modifiers: {}", modifiers.join(", ")));
    }
    if winner.bonus > 0.0 {
        text.push_str(&format!("; state bonus {:.3}", winner.bonus));
    }
    match (constraint_level, cap) {
        (ConstraintLevel::CapOnly, Some(cap)) => {
            text.push_str(&format!(
                "; relaxed: easy-subtype preference dropped (cap {cap:.2} kept)"
            ));
        }
        (ConstraintLevel::Uncapped, Some(cap)) => {
            text.push_str(&format!(
                "; relaxed: difficulty cap {cap:.2} lifted, no candidate under cap"
            ));
        }
        _ => {}
    }
    match winner.stage {
        AttemptStage::Preferred => {}
        AttemptStage::Alternate => text.push_str("; produced by alternate-type fallback"),
        AttemptStage::Random => text.push_str("; produced by random-type fallback"),
    }
    text
}
