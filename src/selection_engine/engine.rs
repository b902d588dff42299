//! The selection pipeline end to end.
//!
//! classify → resolve distribution → plan slots → fan out to the producer →
//! safety filter → score → argmax → record context.
//!
//! Everything except the producer fan-out is pure. The engine holds no
//! per-user state; rotation state travels in and out through
//! [`RotationCursor`].

use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::selection_engine::{
    candidates::{apply_safety, difficulty_cap, generate, plan_slots},
    classifier::classify,
    config::EngineConfig,
    distribution::resolve,
    error::EngineError,
    models::{
        AdaptiveContext, BehavioralPattern, ConstraintLevel, PredictedOutcomes,
        PuzzleRecommendation, RotationCursor, ScoredCandidate, SessionContext, UserProfile,
    },
    producer::PuzzleProducer,
    scoring::{reasoning, score_candidate, select, ScoringInput},
    store::{ProfileStore, SelectionEvent, TelemetrySink},
};

/// Snapshot taken at request start. The engine never re-reads it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionRequest {
    pub profile: UserProfile,
    pub session: SessionContext,
    /// Behavioral window, oldest first.
    pub patterns: Vec<BehavioralPattern>,
    pub cursor: RotationCursor,
    /// `Some` for reproducible selections, `None` to seed from entropy.
    pub rng_seed: Option<u64>,
}

pub struct AdaptiveEngine<P> {
    config: EngineConfig,
    producer: P,
    telemetry: Option<Arc<dyn TelemetrySink>>,
}

impl<P: PuzzleProducer> AdaptiveEngine<P> {
    pub fn new(config: EngineConfig, producer: P) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config, producer, telemetry: None })
    }

    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn select(
        &self,
        request: &SelectionRequest,
    ) -> Result<PuzzleRecommendation, EngineError> {
        let mut rng = match request.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.select_with_rng(request, &mut rng).await
    }

    /// Load the user from `store`, then select. Store failures fall back to
    /// the conservative default profile and an empty behavioral window.
    pub async fn select_for_user<S: ProfileStore + ?Sized>(
        &self,
        store: &S,
        user_id: &str,
        session: SessionContext,
        cursor: RotationCursor,
        rng_seed: Option<u64>,
    ) -> Result<PuzzleRecommendation, EngineError> {
        let profile = match store.load(user_id) {
            Ok(profile) => profile,
            Err(err) => {
                warn!(user_id, error = %err, "profile unavailable, using conservative default");
                UserProfile::conservative_default()
            }
        };
        let patterns = match store.behavioral_history(user_id) {
            Ok(patterns) => patterns,
            Err(err) => {
                warn!(user_id, error = %err, "behavioral history unavailable");
                Vec::new()
            }
        };

        let request = SelectionRequest { profile, session, patterns, cursor, rng_seed };
        self.select(&request).await
    }

    pub async fn select_with_rng<R: Rng>(
        &self,
        request: &SelectionRequest,
        rng: &mut R,
    ) -> Result<PuzzleRecommendation, EngineError> {
        let profile = &request.profile;
        let window = recent_window(&request.patterns, self.config.session.behavioral_window_cap);

        let classification = classify(profile, &request.session, window, &self.config);
        let state = classification.state;
        let distribution = resolve(&state, profile, classification.pattern_strong_math_weak);

        let plans = plan_slots(&distribution, profile, &state, &request.cursor, &self.config, rng);
        let recent = request.cursor.recent_patterns();
        let cap = difficulty_cap(state.base, &self.config.safety);
        let generation = generate(&self.producer, &plans, &recent, cap, &self.config).await;

        if generation.candidates.is_empty() {
            warn!(
                user_state = %state,
                attempts = generation.attempts.len(),
                "no candidate produced for any slot"
            );
            return Err(EngineError::ProducerExhausted { attempts: generation.attempts });
        }

        let (admissible, constraint_level) = apply_safety(&generation.candidates, cap);
        if constraint_level != ConstraintLevel::Strict {
            warn!(
                user_state = %state,
                cap = ?cap,
                level = ?constraint_level,
                "safety constraints relaxed"
            );
        }

        let input = ScoringInput {
            profile,
            state: &state,
            cursor: &request.cursor,
            config: &self.config.scoring,
        };
        let scored: Vec<ScoredCandidate> =
            admissible.iter().map(|c| score_candidate(c, &input)).collect();
        debug!(scored = scored.len(), "scored candidates");

        let Some(winner) = select(&scored, &distribution).cloned() else {
            return Err(EngineError::ProducerExhausted { attempts: generation.attempts });
        };

        let selection_reasoning = reasoning(&winner, &state, constraint_level, cap);
        let cursor = request.cursor.advanced(&winner.puzzle.puzzle_type);

        info!(
            user_state = %state,
            pool = %winner.pool,
            puzzle_type = %winner.puzzle.puzzle_type,
            difficulty = winner.puzzle.discovered_difficulty,
            score = winner.total,
            "selected puzzle"
        );

        let recommendation = PuzzleRecommendation {
            predicted_outcomes: PredictedOutcomes {
                success_probability: winner.breakdown.predicted_success,
                engagement_score: winner.breakdown.predicted_engagement,
            },
            puzzle: winner.puzzle.clone(),
            source_pool: winner.pool,
            selection_reasoning,
            pool_distribution: distribution,
            user_state: state,
            cursor,
            context: AdaptiveContext {
                level: profile.level(),
                skill_momentum: classification.skill_momentum,
                pattern_strong_math_weak: classification.pattern_strong_math_weak,
                difficulty_cap: cap,
                constraint_level,
                recent_successes: request.session.recent_success_count(),
                session_trend: request.session.performance_trend(),
                attempts: generation.attempts,
                candidates: scored,
            },
        };

        self.emit(&recommendation);
        Ok(recommendation)
    }

    fn emit(&self, recommendation: &PuzzleRecommendation) {
        let Some(sink) = &self.telemetry else {
            return;
        };
        if let Err(err) = sink.record(&SelectionEvent::from(recommendation)) {
            warn!(error = %err, "telemetry sink failed, recommendation unaffected");
        }
    }
}

/// Most recent `cap` patterns of an oldest-first window.
fn recent_window(patterns: &[BehavioralPattern], cap: usize) -> &[BehavioralPattern] {
    let start = patterns.len().saturating_sub(cap);
    &patterns[start..]
}
