//! Adaptive selection engine: learner classification, pool apportioning,
//! candidate generation and scoring.
//!
//! ## Module overview
//!
//! | Module         | Purpose |
//! |----------------|---------|
//! | `models`       | Shared types: profile, user state, pools, puzzle DNA, recommendation |
//! | `config`       | `EngineConfig` with serde defaults and env overlay |
//! | `error`        | `EngineError`, `StoreError`, `TelemetryError` |
//! | `helpers`      | Clamping, neutral fallbacks, rotation |
//! | `classifier`   | Base state, modifiers, momentum, pattern-strong/math-weak flag |
//! | `distribution` | Table-driven base distributions, boosts, modifier deltas, normalization |
//! | `producer`     | `PuzzleProducer` trait and the deterministic `CatalogProducer` |
//! | `candidates`   | Slot planning, concurrent fan-out with timeouts, safety filter |
//! | `scoring`      | Multi-criteria scoring, state bonuses, argmax, reasoning text |
//! | `store`        | Profile store and telemetry sink seams |
//! | `engine`       | `AdaptiveEngine`, the end-to-end pipeline |

pub mod candidates;
pub mod classifier;
pub mod config;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod helpers;
pub mod models;
pub mod producer;
pub mod scoring;
pub mod store;

pub use config::{EngineConfig, PersonaConfig, SafetyConfig, ScoringConfig, SessionConfig};
pub use engine::{AdaptiveEngine, SelectionRequest};
pub use error::{EngineError, StoreError, TelemetryError};
pub use models::{
    AdaptiveContext, BaseState, BehavioralHistory, BehavioralPattern, CognitiveProfile,
    CognitiveScore, ConstraintLevel, Modifier, ModifierSet, Pool, PoolDistribution,
    PredictedOutcomes, PuzzleDna, PuzzleRecommendation, RotationCursor, SessionContext,
    SessionOutcome, TypeStats, UserProfile, UserState,
};
pub use producer::{CatalogProducer, ProduceRequest, PuzzleProducer};
pub use store::{InMemoryProfileStore, ProfileStore, SelectionEvent, TelemetrySink, TracingSink};
