//! Walk a handful of learners through the selection pipeline.
//!
//! Run with: `cargo run --example demo`
//! Set `RUST_LOG=adaptive_puzzle_engine=debug` to see every pipeline stage.
//!
//! 1. **Personas**: a brand-new learner, a struggling learner in a confidence
//!    crisis, a steady level-7 learner and an expert, each with a fixed seed.
//! 2. **A short session**: one learner plays five puzzles in a row through an
//!    in-memory store, with the rotation cursor fed back on every call.

use std::error::Error;
use std::sync::Arc;

use adaptive_puzzle_engine::{
    selection_engine::models::TypeStats, AdaptiveEngine, BehavioralPattern, CatalogProducer,
    EngineConfig, InMemoryProfileStore, ProfileStore, PuzzleRecommendation, RotationCursor,
    SelectionRequest, SessionContext, SessionOutcome, TracingSink, UserProfile,
};
use tracing_subscriber::EnvFilter;

fn print_recommendation(label: &str, rec: &PuzzleRecommendation) {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  [{label}]  state: {}  level: {}", rec.user_state, rec.context.level);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  Distribution: {}", rec.pool_distribution);
    println!(
        "  Puzzle:       {} ({}) difficulty {:.2}  from {}",
        rec.puzzle.puzzle_type,
        rec.puzzle.puzzle_subtype,
        rec.puzzle.discovered_difficulty,
        rec.source_pool
    );
    println!(
        "  Predicted:    success {:.2}  engagement {:.2}",
        rec.predicted_outcomes.success_probability, rec.predicted_outcomes.engagement_score
    );
    println!(
        "  Candidates:   {} scored, {} producer attempts",
        rec.context.candidates.len(),
        rec.context.attempts.len()
    );
    println!("  Why:          {}", rec.selection_reasoning);
    println!();
}

fn steady_profile() -> UserProfile {
    let mut p = UserProfile {
        total_puzzles_solved: 25,
        overall_accuracy: 0.65,
        current_skill_level: 0.55,
        high_score: 180,
        ..UserProfile::conservative_default()
    };
    p.puzzle_type_stats.insert("pattern".into(), TypeStats::new(0.85, 15));
    p.puzzle_type_stats.insert("number-series".into(), TypeStats::new(0.25, 8));
    p.puzzle_type_stats.insert("algebraic".into(), TypeStats::new(0.1, 2));
    p
}

fn expert_profile() -> UserProfile {
    UserProfile {
        total_puzzles_solved: 400,
        overall_accuracy: 0.93,
        current_skill_level: 0.85,
        preferred_difficulty: 0.9,
        high_score: 2400,
        ..UserProfile::conservative_default()
    }
}

fn struggling_profile() -> UserProfile {
    UserProfile {
        total_puzzles_solved: 40,
        overall_accuracy: 0.42,
        skill_momentum: -0.3,
        current_skill_level: 0.6,
        high_score: 300,
        ..UserProfile::conservative_default()
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = EngineConfig::from_env();
    let engine = AdaptiveEngine::new(config.clone(), CatalogProducer::new(2024))?
        .with_telemetry(Arc::new(TracingSink));

    println!("\n=== Personas ===\n");

    let mut crisis = SessionContext::default();
    for performance in [0.45, 0.3, 0.2] {
        crisis.record(SessionOutcome { solved: false, performance, used_assistance: true });
    }

    let personas = [
        ("new learner", UserProfile::conservative_default(), SessionContext::default(), 1),
        ("struggling, crisis", struggling_profile(), crisis, 2),
        ("steady, level 7", steady_profile(), SessionContext::default(), 3),
        ("expert", expert_profile(), SessionContext::default(), 4),
    ];
    for (label, profile, session, seed) in personas {
        let request = SelectionRequest {
            profile,
            session,
            rng_seed: Some(seed),
            ..SelectionRequest::default()
        };
        let rec = engine.select(&request).await?;
        print_recommendation(label, &rec);
    }

    println!("=== A short session ===\n");

    let store = InMemoryProfileStore::new(config.session.behavioral_window_cap);
    store.upsert_profile("demo-learner", steady_profile());

    let mut session = SessionContext::default();
    let mut cursor = RotationCursor::default();
    for round in 0..5u64 {
        let rec = engine
            .select_for_user(&store, "demo-learner", session.clone(), cursor, Some(100 + round))
            .await?;
        print_recommendation(&format!("round {}", round + 1), &rec);

        // Pretend the learner solves puzzles about as often as predicted.
        let solved = rec.predicted_outcomes.success_probability >= 0.75;
        let performance = if solved { 0.8 } else { 0.3 };
        session.record(SessionOutcome { solved, performance, used_assistance: false });
        let pattern = BehavioralPattern::with_accuracy(performance);
        store.append_behavioral_pattern("demo-learner", pattern)?;
        cursor = rec.cursor;
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(run())
}
