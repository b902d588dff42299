//! # adaptive_puzzle_engine
//!
//! Picks the next puzzle for a learner from a pool of freshly produced
//! candidates, adapting to how the learner is doing right now.
//!
//! ## How it works
//!
//! 1. Build a [`SelectionRequest`] from a [`UserProfile`] snapshot, the
//!    current [`SessionContext`], the recent behavioral window and the
//!    caller-owned [`RotationCursor`].
//! 2. Call [`AdaptiveEngine::select`]. The engine classifies the learner into
//!    one of eight base states plus modifiers, apportions ten candidate slots
//!    across five pools, asks the [`PuzzleProducer`] for one candidate per
//!    slot (concurrently, each call under a timeout), filters them through
//!    the difficulty caps, scores the survivors and keeps the best.
//! 3. The returned [`PuzzleRecommendation`] carries the puzzle, predicted
//!    outcomes, the distribution and state used, a reasoning string, the
//!    scoring trail, and the advanced cursor for the next call.
//!
//! ## Key features
//!
//! - **Deterministic**: pass `rng_seed: Some(u64)` and the same inputs always
//!   yield the same recommendation.
//! - **Safe for beginners**: `new_user` never sees difficulty above 0.4 and
//!   struggling learners never above 0.6, unless no candidate fits and the
//!   relaxation is written into the reasoning.
//! - **Never stuck on a producer**: a slot that cannot be filled falls back to
//!   other types, then to a random type; only a fully empty batch is an error.
//!
//! ## Quick start
//!
//! ```rust
//! use adaptive_puzzle_engine::{AdaptiveEngine, CatalogProducer, EngineConfig, SelectionRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
//! let engine = AdaptiveEngine::new(EngineConfig::default(), CatalogProducer::new(7))?;
//!
//! // A brand-new learner: everything defaulted, fixed seed.
//! let request = SelectionRequest { rng_seed: Some(42), ..SelectionRequest::default() };
//! let rec = runtime.block_on(engine.select(&request))?;
//!
//! println!("{} -> {} ({})", rec.user_state, rec.puzzle.puzzle_type, rec.source_pool);
//! println!("{}", rec.selection_reasoning);
//!
//! // Feed the cursor back in on the next call.
//! let next = SelectionRequest {
//!     cursor: rec.cursor,
//!     rng_seed: Some(43),
//!     ..SelectionRequest::default()
//! };
//! let _ = runtime.block_on(engine.select(&next))?;
//! # Ok(())
//! # }
//! ```

pub mod selection_engine;

// Convenience re-exports so callers can use `adaptive_puzzle_engine::AdaptiveEngine`
// directly without reaching into `selection_engine::`.
pub use selection_engine::{
    AdaptiveEngine, BaseState, BehavioralPattern, CatalogProducer, EngineConfig, EngineError,
    InMemoryProfileStore, Modifier, Pool, PoolDistribution, ProduceRequest, ProfileStore,
    PuzzleDna, PuzzleProducer, PuzzleRecommendation, RotationCursor, SelectionRequest,
    SessionContext, SessionOutcome, TelemetrySink, TracingSink, UserProfile, UserState,
};

#[cfg(test)]
mod tests;
