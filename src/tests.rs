//! Cross-module scenario tests for the `adaptive_puzzle_engine` crate.
//!
//! Included from `lib.rs` under `#[cfg(test)]`.
//!
//! | Group | What is tested |
//! |-------|----------------|
//! | Determinism | Same seed → identical recommendation; cursor chaining |
//! | Safety | `new_user` and struggling caps; relaxation recorded in reasoning |
//! | Classification | Worked profile → `stable` / `{5,4,1,0,0}`; idempotence; dominance |
//! | Failure paths | Producer exhaustion lists attempts; missing profile; telemetry failure |
//! | Store | Behavioral history feeds momentum through `select_for_user` |

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::selection_engine::{
    classifier::classify,
    models::{AttemptOutcome, ConstraintLevel, TypeStats},
    AdaptiveEngine, BaseState, BehavioralPattern, CatalogProducer, EngineConfig, EngineError,
    InMemoryProfileStore, Modifier, ProduceRequest, ProfileStore, PuzzleDna, PuzzleProducer,
    RotationCursor, SelectionEvent, SelectionRequest, SessionContext, SessionOutcome,
    TelemetryError, TelemetrySink, UserProfile,
};

// ── helpers ──────────────────────────────────────────────────────────────────

/// Five seeds that span different RNG states.
const SEEDS: [u64; 5] = [1, 42, 999, 0xDEAD_BEEF, 7];

fn engine() -> AdaptiveEngine<CatalogProducer> {
    AdaptiveEngine::new(EngineConfig::default(), CatalogProducer::new(17)).unwrap()
}

fn req(profile: UserProfile, seed: u64) -> SelectionRequest {
    SelectionRequest { profile, rng_seed: Some(seed), ..SelectionRequest::default() }
}

/// Level 7, solid pattern player, weak at number-series, barely tried algebra.
fn worked_profile() -> UserProfile {
    let mut p = UserProfile {
        total_puzzles_solved: 25,
        overall_accuracy: 0.65,
        skill_momentum: 0.0,
        current_skill_level: 0.55,
        preferred_difficulty: 0.5,
        high_score: 180,
        ..UserProfile::conservative_default()
    };
    p.puzzle_type_stats.insert("pattern".into(), TypeStats::new(0.85, 15));
    p.puzzle_type_stats.insert("number-series".into(), TypeStats::new(0.25, 8));
    p.puzzle_type_stats.insert("algebraic".into(), TypeStats::new(0.1, 2));
    p
}

fn struggling_profile() -> UserProfile {
    UserProfile {
        total_puzzles_solved: 40,
        overall_accuracy: 0.42,
        skill_momentum: -0.3,
        current_skill_level: 0.7,
        high_score: 900,
        ..UserProfile::conservative_default()
    }
}

fn failed(performance: f64) -> SessionOutcome {
    SessionOutcome { solved: false, performance, used_assistance: false }
}

/// Answers every request with the same hard puzzle of the requested type.
struct OnlyHard;

impl PuzzleProducer for OnlyHard {
    fn produce(&self, request: ProduceRequest) -> impl Future<Output = Option<PuzzleDna>> + Send {
        std::future::ready(Some(PuzzleDna {
            puzzle_type: request.puzzle_type,
            puzzle_subtype: "hard".to_string(),
            discovered_difficulty: 0.9,
            skill_targets: vec!["working_memory".to_string()],
            engagement_potential: 0.6,
        }))
    }
}

/// Hard pattern and logic-grid puzzles, easy arithmetic.
struct HardExceptArithmetic;

impl PuzzleProducer for HardExceptArithmetic {
    fn produce(&self, request: ProduceRequest) -> impl Future<Output = Option<PuzzleDna>> + Send {
        let (subtype, difficulty) = match request.puzzle_type.as_str() {
            "arithmetic" => ("easy", 0.2),
            _ => ("standard", 0.8),
        };
        std::future::ready(Some(PuzzleDna {
            puzzle_type: request.puzzle_type,
            puzzle_subtype: subtype.to_string(),
            discovered_difficulty: difficulty,
            skill_targets: vec!["working_memory".to_string()],
            engagement_potential: 0.6,
        }))
    }
}

struct NeverProduces;

impl PuzzleProducer for NeverProduces {
    fn produce(&self, _request: ProduceRequest) -> impl Future<Output = Option<PuzzleDna>> + Send {
        std::future::ready(None)
    }
}

#[derive(Default)]
struct FailingSink {
    calls: AtomicUsize,
}

impl TelemetrySink for FailingSink {
    fn record(&self, _event: &SelectionEvent) -> Result<(), TelemetryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TelemetryError::Unavailable("collector offline".to_string()))
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<SelectionEvent>>,
}

impl TelemetrySink for RecordingSink {
    fn record(&self, event: &SelectionEvent) -> Result<(), TelemetryError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

// ── determinism ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn same_seed_gives_identical_recommendation() {
    let engine = engine();
    for &seed in &SEEDS {
        let a = engine.select(&req(worked_profile(), seed)).await.unwrap();
        let b = engine.select(&req(worked_profile(), seed)).await.unwrap();
        assert_eq!(a, b, "seed={seed}");
    }
}

#[tokio::test]
async fn cursor_chains_across_requests() {
    let engine = engine();
    let mut cursor = RotationCursor::default();
    let mut picked = Vec::new();

    for (step, &seed) in SEEDS.iter().chain(&[11, 12]).enumerate() {
        let request = SelectionRequest { cursor: cursor.clone(), ..req(worked_profile(), seed) };
        let rec = engine.select(&request).await.unwrap();
        assert_eq!(rec.cursor.position, step + 1);
        assert!(rec.cursor.recent.len() <= 5);
        picked.push(rec.puzzle.puzzle_type.clone());
        cursor = rec.cursor;
    }

    let tail: Vec<String> = picked[picked.len() - 5..].to_vec();
    assert_eq!(cursor.recent_patterns(), tail);
    assert_eq!(cursor.last_type.as_deref(), picked.last().map(String::as_str));
}

// ── safety ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn new_user_never_exceeds_cap_without_recorded_relaxation() {
    let engine = engine();
    for &seed in &SEEDS {
        let rec = engine.select(&req(UserProfile::conservative_default(), seed)).await.unwrap();
        assert_eq!(rec.user_state.base, BaseState::NewUser);
        let difficulty = rec.puzzle.discovered_difficulty;
        assert!(
            difficulty <= 0.4 || rec.selection_reasoning.contains("lifted"),
            "seed={seed} difficulty={difficulty} reasoning={}",
            rec.selection_reasoning
        );
    }
}

#[tokio::test]
async fn new_user_gets_easy_variant_when_one_exists() {
    let engine = engine();
    let rec = engine.select(&req(UserProfile::conservative_default(), 3)).await.unwrap();
    assert_eq!(rec.context.constraint_level, ConstraintLevel::Strict);
    assert!(rec.puzzle.is_easy_variant(), "{:?}", rec.puzzle);
    assert_eq!(rec.context.difficulty_cap, Some(0.4));
}

#[tokio::test]
async fn relaxation_is_recorded_when_nothing_fits_the_cap() {
    let engine = AdaptiveEngine::new(EngineConfig::default(), OnlyHard).unwrap();
    let rec = engine.select(&req(UserProfile::conservative_default(), 5)).await.unwrap();

    assert_eq!(rec.context.constraint_level, ConstraintLevel::Uncapped);
    assert_eq!(rec.puzzle.discovered_difficulty, 0.9);
    assert!(rec.selection_reasoning.contains("cap 0.40 lifted"), "{}", rec.selection_reasoning);
    assert!(rec.context.attempts.iter().all(|a| a.outcome == AttemptOutcome::OverCap));
}

#[tokio::test]
async fn new_user_gets_under_cap_alternate_before_any_relaxation() {
    let config = EngineConfig {
        enabled_types: vec!["pattern".into(), "logic-grid".into(), "arithmetic".into()],
        ..EngineConfig::default()
    };
    let engine = AdaptiveEngine::new(config, HardExceptArithmetic).unwrap();
    // Every pool prefers pattern or logic-grid; arithmetic only shows up as an
    // alternate.
    let mut profile = UserProfile::conservative_default();
    profile.puzzle_type_stats.insert("pattern".into(), TypeStats::new(0.9, 3));
    profile.puzzle_type_stats.insert("logic-grid".into(), TypeStats::new(0.5, 2));

    for &seed in &SEEDS {
        let rec = engine.select(&req(profile.clone(), seed)).await.unwrap();
        assert_eq!(rec.user_state.base, BaseState::NewUser, "seed={seed}");
        assert_eq!(rec.puzzle.puzzle_type, "arithmetic", "seed={seed}");
        assert!(rec.puzzle.discovered_difficulty <= 0.4, "seed={seed}");
        assert_eq!(rec.context.constraint_level, ConstraintLevel::Strict, "seed={seed}");
        assert!(!rec.selection_reasoning.contains("lifted"), "{}", rec.selection_reasoning);
        assert!(
            rec.context.attempts.iter().any(|a| a.outcome == AttemptOutcome::OverCap),
            "seed={seed}"
        );
    }
}

#[tokio::test]
async fn struggling_learner_in_crisis_stays_under_struggling_cap() {
    let engine = engine();
    let mut session = SessionContext::default();
    for perf in [0.4, 0.3, 0.2] {
        session.record(failed(perf));
    }
    let request = SelectionRequest { session, ..req(struggling_profile(), 21) };
    let rec = engine.select(&request).await.unwrap();

    assert_eq!(rec.user_state.base, BaseState::Struggling);
    assert!(rec.user_state.has(Modifier::ConfidenceCrisis));
    assert_eq!(rec.pool_distribution.total(), 10);
    assert_eq!(rec.pool_distribution.progressive_challenge, 0);
    assert!(rec.puzzle.discovered_difficulty <= 0.6 || rec.selection_reasoning.contains("lifted"));
    assert_eq!(rec.context.recent_successes, 0);
    assert!((rec.context.session_trend + 0.2).abs() < 1e-9, "{}", rec.context.session_trend);
}

#[tokio::test]
async fn only_enabled_types_are_selected() {
    let config = EngineConfig {
        enabled_types: vec!["logic-grid".to_string(), "memory-match".to_string()],
        ..EngineConfig::default()
    };
    let engine = AdaptiveEngine::new(config, CatalogProducer::new(2)).unwrap();
    for &seed in &SEEDS {
        let rec = engine.select(&req(worked_profile(), seed)).await.unwrap();
        assert!(
            ["logic-grid", "memory-match"].contains(&rec.puzzle.puzzle_type.as_str()),
            "seed={seed} type={}",
            rec.puzzle.puzzle_type
        );
        assert!(rec.context.candidates.iter().all(|c| c.puzzle.puzzle_type != "pattern"));
    }
}

// ── classification ───────────────────────────────────────────────────────────

#[tokio::test]
async fn worked_profile_is_stable_with_level_boost_only() {
    let rec = engine().select(&req(worked_profile(), 42)).await.unwrap();

    assert_eq!(rec.user_state.base, BaseState::Stable);
    assert!(rec.user_state.modifiers.is_empty());
    assert!(!rec.context.pattern_strong_math_weak);
    assert_eq!(rec.context.level, 7);
    assert_eq!(rec.pool_distribution.as_array(), [5, 4, 1, 0, 0]);
    assert!(rec.selection_reasoning.contains("stable"));
}

#[test]
fn classify_is_idempotent() {
    let config = EngineConfig::default();
    let mut session = SessionContext::default();
    for perf in [0.9, 0.7, 0.5, 0.3] {
        session.record(SessionOutcome { solved: true, performance: perf, used_assistance: true });
    }
    let patterns: Vec<BehavioralPattern> =
        [0.7, 0.6, 0.4, 0.3].into_iter().map(BehavioralPattern::with_accuracy).collect();

    let first = classify(&worked_profile(), &session, &patterns, &config);
    let second = classify(&worked_profile(), &session, &patterns, &config);
    assert_eq!(first, second);
    assert!(first.state.has(Modifier::Fatigued));
    assert!(first.state.has(Modifier::PowerDependent));
}

mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn few_solved_puzzles_always_classify_as_new_user(
            solved in 0u32..=5,
            accuracy in 0.0f64..=1.0,
            momentum in -1.0f64..=1.0,
            preferred in 0.0f64..=1.0,
            trends in proptest::collection::vec(0.0f64..=1.0, 0..12),
        ) {
            let profile = UserProfile {
                total_puzzles_solved: solved,
                overall_accuracy: accuracy,
                skill_momentum: momentum,
                preferred_difficulty: preferred,
                ..UserProfile::conservative_default()
            };
            let patterns: Vec<BehavioralPattern> =
                trends.into_iter().map(BehavioralPattern::with_accuracy).collect();
            let config = EngineConfig::default();
            let c = classify(&profile, &SessionContext::default(), &patterns, &config);
            prop_assert_eq!(c.state.base, BaseState::NewUser);
        }
    }
}

// ── failure paths ────────────────────────────────────────────────────────────

#[tokio::test]
async fn exhausted_producer_is_reported_with_attempts() {
    let engine = AdaptiveEngine::new(EngineConfig::default(), NeverProduces).unwrap();
    let err = engine.select(&req(UserProfile::conservative_default(), 9)).await.unwrap_err();

    let EngineError::ProducerExhausted { attempts } = &err else {
        panic!("expected exhaustion, got {err:?}");
    };
    // Ten slots, each: preferred + three alternates + one random.
    assert_eq!(attempts.len(), 50);
    let message = err.to_string();
    assert!(message.contains("confidence_builders/pattern"), "{message}");
    assert!(message.contains("50 attempts"), "{message}");
}

#[tokio::test]
async fn missing_profile_falls_back_to_new_user() {
    let store = InMemoryProfileStore::new(20);
    let rec = engine()
        .select_for_user(
            &store,
            "unknown-learner",
            SessionContext::default(),
            RotationCursor::default(),
            Some(4),
        )
        .await
        .unwrap();
    assert_eq!(rec.user_state.base, BaseState::NewUser);
    assert_eq!(rec.pool_distribution.as_array(), [8, 2, 0, 0, 0]);
}

#[tokio::test]
async fn telemetry_failure_does_not_change_the_result() {
    let plain = engine().select(&req(worked_profile(), 77)).await.unwrap();

    let sink = Arc::new(FailingSink::default());
    let with_sink = engine().with_telemetry(sink.clone());
    let observed = with_sink.select(&req(worked_profile(), 77)).await.unwrap();

    assert_eq!(plain, observed);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn telemetry_receives_selection_summary() {
    let sink = Arc::new(RecordingSink::default());
    let engine = engine().with_telemetry(sink.clone());
    let rec = engine.select(&req(worked_profile(), 5)).await.unwrap();

    let events = sink.events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].puzzle_type, rec.puzzle.puzzle_type);
    assert_eq!(events[0].distribution, [5, 4, 1, 0, 0]);
    assert_eq!(events[0].user_state, "stable");
}

// ── store-backed selection ───────────────────────────────────────────────────

#[tokio::test]
async fn stored_history_drives_momentum() {
    let store = InMemoryProfileStore::new(20);
    store.upsert_profile("kai", worked_profile());
    for trend in [0.8, 0.8, 0.8, 0.4, 0.4, 0.4] {
        store.append_behavioral_pattern("kai", BehavioralPattern::with_accuracy(trend)).unwrap();
    }

    let rec = engine()
        .select_for_user(
            &store,
            "kai",
            SessionContext::default(),
            RotationCursor::default(),
            Some(6),
        )
        .await
        .unwrap();
    assert_eq!(rec.user_state.base, BaseState::FallingBack);
    assert!((rec.context.skill_momentum + 0.4).abs() < 1e-9);
}
