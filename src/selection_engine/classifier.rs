//! Maps a profile snapshot plus session signals to a [`UserState`].
//!
//! Pure: identical inputs always give an identical classification.

use tracing::debug;

use crate::selection_engine::{
    config::{EngineConfig, PersonaConfig, SessionConfig},
    helpers::mean,
    models::{
        BaseState, BehavioralPattern, Modifier, ModifierSet, SessionContext, UserProfile,
        UserState,
    },
};

const NEW_USER_MAX_SOLVED: u32 = 5;

/// Most samples the recent half of the momentum window may hold.
const RECENT_HALF_CAP: usize = 5;

/// Sample count at which momentum is trusted fully.
const MOMENTUM_FULL_CONFIDENCE: f64 = 5.0;

const PATTERN_MIN_ATTEMPTS: u32 = 5;
const PATTERN_STRONG_ABOVE: f64 = 0.75;
const MATH_MIN_ATTEMPTS: u32 = 3;
const MATH_MIN_QUALIFYING: usize = 2;
const MATH_WEAK_BELOW: f64 = 0.4;

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub state: UserState,
    pub skill_momentum: f64,
    pub pattern_strong_math_weak: bool,
}

pub fn classify(
    profile: &UserProfile,
    session: &SessionContext,
    patterns: &[BehavioralPattern],
    config: &EngineConfig,
) -> Classification {
    let skill_momentum = skill_momentum(profile, patterns);
    let base = base_state(profile, skill_momentum);
    let modifiers = detect_modifiers(session, patterns, &config.session);
    let pattern_strong_math_weak = is_pattern_strong_math_weak(profile, &config.persona);

    let state = UserState { base, modifiers };
    debug!(
        user_state = %state,
        skill_momentum,
        pattern_strong_math_weak,
        samples = patterns.len(),
        "classified user"
    );

    Classification { state, skill_momentum, pattern_strong_math_weak }
}

/// Damped accuracy trend over the behavioral window (oldest first).
///
/// With no samples the profile's stored momentum is used as-is.
pub fn skill_momentum(profile: &UserProfile, patterns: &[BehavioralPattern]) -> f64 {
    let n = patterns.len();
    let momentum = match n {
        0 => profile.skill_momentum,
        1 => (patterns[0].accuracy_trend - 0.5) * 0.3,
        2 => (patterns[1].accuracy_trend - patterns[0].accuracy_trend) * 0.6,
        _ => {
            let recent_len = n.div_ceil(2).min(RECENT_HALF_CAP);
            let (older, recent) = patterns.split_at(n - recent_len);
            let recent_avg = mean(recent.iter().map(|p| p.accuracy_trend)).unwrap_or(0.0);
            let older_avg = mean(older.iter().map(|p| p.accuracy_trend)).unwrap_or(0.0);
            let confidence = (n as f64 / MOMENTUM_FULL_CONFIDENCE).min(1.0);
            (recent_avg - older_avg) * confidence
        }
    };
    if momentum.is_finite() {
        momentum.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// First matching rule wins.
pub fn base_state(profile: &UserProfile, momentum: f64) -> BaseState {
    let accuracy = profile.overall_accuracy;

    if profile.total_puzzles_solved <= NEW_USER_MAX_SOLVED {
        BaseState::NewUser
    } else if accuracy < 0.3 && momentum < -0.2 {
        BaseState::SeverelyStruggling
    } else if accuracy < 0.5 && momentum < -0.1 {
        BaseState::Struggling
    } else if momentum < -0.05 {
        BaseState::FallingBack
    } else if accuracy > 0.9 && profile.preferred_difficulty > 0.8 {
        BaseState::ExpertDemanding
    } else if accuracy > 0.8 && momentum > 0.1 {
        BaseState::Excelling
    } else if momentum > 0.05 && accuracy >= 0.6 {
        BaseState::Progressing
    } else {
        BaseState::Stable
    }
}

/// Each modifier is evaluated on its own; any combination may fire.
pub fn detect_modifiers(
    session: &SessionContext,
    patterns: &[BehavioralPattern],
    config: &SessionConfig,
) -> ModifierSet {
    let mut modifiers = ModifierSet::new();

    if session.consecutive_failures >= config.crisis_failures {
        modifiers.insert(Modifier::ConfidenceCrisis);
    }

    let engagement = session
        .engagement_level
        .or_else(|| patterns.last().map(|p| p.engagement_score));
    if matches!(engagement, Some(e) if e < config.disengaged_below) {
        modifiers.insert(Modifier::Disengaged);
    }

    if is_power_dependent(session, patterns, config.assistance_window) {
        modifiers.insert(Modifier::PowerDependent);
    }

    let performances: Vec<f64> = session.outcomes.iter().map(|o| o.performance).collect();
    if is_monotonic_decline(&performances, config.fatigue_window) {
        modifiers.insert(Modifier::Fatigued);
    }
    if is_session_decline(&performances, config.decline_threshold) {
        modifiers.insert(Modifier::SessionDecline);
    }

    modifiers
}

fn is_power_dependent(
    session: &SessionContext,
    patterns: &[BehavioralPattern],
    window: usize,
) -> bool {
    let recent: Vec<bool> = session
        .outcomes
        .iter()
        .rev()
        .take(window.max(1))
        .map(|o| o.used_assistance)
        .collect();

    if recent.is_empty() {
        mean(patterns.iter().map(|p| p.powerup_dependency)).is_some_and(|d| d > 0.5)
    } else {
        let assisted = recent.iter().filter(|&&used| used).count();
        assisted * 2 > recent.len()
    }
}

/// The last `window` performances each fall strictly below the one before.
fn is_monotonic_decline(performances: &[f64], window: usize) -> bool {
    if window < 2 || performances.len() < window {
        return false;
    }
    let tail = &performances[performances.len() - window..];
    tail.windows(2).all(|pair| pair[1] < pair[0])
}

/// Second-half mean dropped by at least `threshold` versus the first half.
fn is_session_decline(performances: &[f64], threshold: f64) -> bool {
    if performances.len() < 4 {
        return false;
    }
    let (first, second) = performances.split_at(performances.len() / 2);
    match (mean(first.iter().copied()), mean(second.iter().copied())) {
        (Some(a), Some(b)) => a - b >= threshold,
        _ => false,
    }
}

/// Strong in a pattern-like category, broadly weak across math-like ones.
///
/// Heuristic: sparse math history (fewer than two categories with three or
/// more attempts) never fires it, even when the one attempted category is poor.
pub fn is_pattern_strong_math_weak(profile: &UserProfile, persona: &PersonaConfig) -> bool {
    let pattern_strong = persona.pattern_types.iter().any(|t| {
        profile
            .type_stats(t)
            .is_some_and(|s| {
                s.total_attempts >= PATTERN_MIN_ATTEMPTS && s.accuracy > PATTERN_STRONG_ABOVE
            })
    });
    if !pattern_strong {
        return false;
    }

    let attempted: Vec<f64> = persona
        .math_types
        .iter()
        .filter_map(|t| profile.type_stats(t))
        .filter(|s| s.total_attempts >= MATH_MIN_ATTEMPTS)
        .map(|s| s.accuracy)
        .collect();
    if attempted.len() < MATH_MIN_QUALIFYING {
        return false;
    }

    let weak = attempted.iter().filter(|&&acc| acc < MATH_WEAK_BELOW).count();
    weak * 2 >= attempted.len()
}
