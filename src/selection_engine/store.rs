//! Profile storage and telemetry seams.
//!
//! The engine reads snapshots through [`ProfileStore`] and reports each
//! finished selection to an optional [`TelemetrySink`]. Neither side can make
//! a selection fail: store errors degrade to the conservative default profile
//! and sink errors are logged and dropped.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

use crate::selection_engine::{
    error::{StoreError, TelemetryError},
    models::{BehavioralHistory, BehavioralPattern, PuzzleRecommendation, UserProfile},
};

pub trait ProfileStore: Send + Sync {
    fn load(&self, user_id: &str) -> Result<UserProfile, StoreError>;

    /// Behavioral window for a user, oldest first. Unknown users have none.
    fn behavioral_history(&self, user_id: &str) -> Result<Vec<BehavioralPattern>, StoreError>;

    fn append_behavioral_pattern(
        &self,
        user_id: &str,
        pattern: BehavioralPattern,
    ) -> Result<(), StoreError>;
}

struct StoredUser {
    profile: UserProfile,
    history: BehavioralHistory,
}

/// Process-local store for tests and the demo.
pub struct InMemoryProfileStore {
    users: RwLock<HashMap<String, StoredUser>>,
    window_cap: usize,
}

impl InMemoryProfileStore {
    pub fn new(window_cap: usize) -> Self {
        Self { users: RwLock::new(HashMap::new()), window_cap }
    }

    /// Insert or replace a profile. Existing behavioral history is kept.
    pub fn upsert_profile(&self, user_id: &str, profile: UserProfile) {
        let mut users = self.users.write();
        match users.get_mut(user_id) {
            Some(stored) => stored.profile = profile,
            None => {
                users.insert(
                    user_id.to_string(),
                    StoredUser { profile, history: BehavioralHistory::new(self.window_cap) },
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn load(&self, user_id: &str) -> Result<UserProfile, StoreError> {
        self.users
            .read()
            .get(user_id)
            .map(|stored| stored.profile.clone())
            .ok_or_else(|| StoreError::NotFound(user_id.to_string()))
    }

    fn behavioral_history(&self, user_id: &str) -> Result<Vec<BehavioralPattern>, StoreError> {
        Ok(self
            .users
            .read()
            .get(user_id)
            .map(|stored| stored.history.to_vec())
            .unwrap_or_default())
    }

    fn append_behavioral_pattern(
        &self,
        user_id: &str,
        pattern: BehavioralPattern,
    ) -> Result<(), StoreError> {
        let mut users = self.users.write();
        let stored = users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(user_id.to_string()))?;
        stored.history.push(pattern);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

/// Compact record of one selection handed to a [`TelemetrySink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionEvent {
    pub user_state: String,
    pub source_pool: String,
    pub puzzle_type: String,
    pub puzzle_subtype: String,
    pub difficulty: f64,
    pub success_probability: f64,
    pub engagement_score: f64,
    pub distribution: [u8; 5],
    pub candidates: usize,
    pub attempts: usize,
    pub reasoning: String,
}

impl From<&PuzzleRecommendation> for SelectionEvent {
    fn from(rec: &PuzzleRecommendation) -> Self {
        Self {
            user_state: rec.user_state.to_string(),
            source_pool: rec.source_pool.to_string(),
            puzzle_type: rec.puzzle.puzzle_type.clone(),
            puzzle_subtype: rec.puzzle.puzzle_subtype.clone(),
            difficulty: rec.puzzle.discovered_difficulty,
            success_probability: rec.predicted_outcomes.success_probability,
            engagement_score: rec.predicted_outcomes.engagement_score,
            distribution: rec.pool_distribution.as_array(),
            candidates: rec.context.candidates.len(),
            attempts: rec.context.attempts.len(),
            reasoning: rec.selection_reasoning.clone(),
        }
    }
}

pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: &SelectionEvent) -> Result<(), TelemetryError>;
}

/// Emits every event as one JSON line through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, event: &SelectionEvent) -> Result<(), TelemetryError> {
        let payload = serde_json::to_string(event)?;
        info!(target: "puzzle_selection", event = %payload, "selection telemetry");
        Ok(())
    }
}
