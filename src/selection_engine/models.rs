use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of candidate slots apportioned across the pools on every request.
pub const TOTAL_SLOTS: u8 = 10;

/// Capacity of the rotation cursor's recent-type memory.
pub const RECENT_TYPES_CAP: usize = 5;

/// Highscore points per level.
pub const POINTS_PER_LEVEL: u32 = 30;

// ---------------------------------------------------------------------------
// Learner profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeStats {
    pub accuracy: f64,
    pub total_attempts: u32,
    pub average_response_time_ms: f64,
}

impl TypeStats {
    pub fn new(accuracy: f64, total_attempts: u32) -> Self {
        Self { accuracy, total_attempts, average_response_time_ms: 0.0 }
    }
}

/// One cognitive dimension: a value in [0,1] with how much we trust it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CognitiveScore {
    pub value: f64,
    pub confidence: f64,
}

impl Default for CognitiveScore {
    fn default() -> Self {
        Self { value: 0.5, confidence: 0.0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CognitiveProfile {
    pub processing_speed: CognitiveScore,
    pub working_memory_capacity: CognitiveScore,
    pub attention_control: CognitiveScore,
    pub error_recovery: CognitiveScore,
}

impl CognitiveProfile {
    /// Look up a dimension by the skill-target name puzzles use.
    pub fn dimension(&self, name: &str) -> Option<CognitiveScore> {
        match name {
            "processing_speed"                            => Some(self.processing_speed),
            "working_memory" | "working_memory_capacity"  => Some(self.working_memory_capacity),
            "attention_control"                           => Some(self.attention_control),
            "error_recovery"                              => Some(self.error_recovery),
            _ => None,
        }
    }
}

/// Read-only snapshot of a learner, owned by the session layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub total_puzzles_solved: u32,
    pub overall_accuracy: f64,
    pub current_skill_level: f64,
    pub skill_momentum: f64,
    pub learning_velocity: f64,
    pub preferred_difficulty: f64,
    pub power_up_inventory: u32,
    pub high_score: u32,
    pub puzzle_type_stats: BTreeMap<String, TypeStats>,
    pub cognitive_profile: CognitiveProfile,
}

impl UserProfile {
    /// Profile used when the store has nothing (or nothing readable) for a user.
    /// Always classifies as `new_user`.
    pub fn conservative_default() -> Self {
        Self {
            total_puzzles_solved: 0,
            overall_accuracy: 0.0,
            current_skill_level: 0.5,
            skill_momentum: 0.0,
            learning_velocity: 0.0,
            preferred_difficulty: 0.5,
            power_up_inventory: 0,
            high_score: 0,
            puzzle_type_stats: BTreeMap::new(),
            cognitive_profile: CognitiveProfile::default(),
        }
    }

    /// `floor(highScore / 30) + 1`.
    pub fn level(&self) -> u32 {
        self.high_score / POINTS_PER_LEVEL + 1
    }

    pub fn type_stats(&self, puzzle_type: &str) -> Option<&TypeStats> {
        self.puzzle_type_stats.get(puzzle_type)
    }

    /// Type with the highest measured accuracy (first by name on ties).
    pub fn strongest_type(&self) -> Option<&str> {
        let mut best: Option<(&str, f64)> = None;
        for (name, stats) in &self.puzzle_type_stats {
            if stats.total_attempts == 0 {
                continue;
            }
            match best {
                Some((_, acc)) if acc >= stats.accuracy => {}
                _ => best = Some((name.as_str(), stats.accuracy)),
            }
        }
        best.map(|(name, _)| name)
    }
}

impl Default for UserProfile {
    fn default() -> Self {
        Self::conservative_default()
    }
}

// ---------------------------------------------------------------------------
// Behavioral history and session counters
// ---------------------------------------------------------------------------

/// Signals derived from one completed puzzle. Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BehavioralPattern {
    pub avg_time_to_first_selection_ms: f64,
    pub hesitation_tendency: f64,
    pub powerup_dependency: f64,
    pub accuracy_trend: f64,
    pub engagement_score: f64,
}

impl BehavioralPattern {
    /// Pattern carrying only an accuracy trend, other signals neutral.
    pub fn with_accuracy(accuracy_trend: f64) -> Self {
        Self {
            avg_time_to_first_selection_ms: 0.0,
            hesitation_tendency: 0.0,
            powerup_dependency: 0.0,
            accuracy_trend,
            engagement_score: 0.5,
        }
    }
}

/// Append-only rolling window, oldest first. Evicts the oldest entry at `cap`.
///
/// Deserializing goes through [`BehavioralHistory::new`] and `push`, so a
/// stored window keeps the same bounds as a freshly built one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredHistory")]
pub struct BehavioralHistory {
    cap: usize,
    patterns: VecDeque<BehavioralPattern>,
}

#[derive(Deserialize)]
struct StoredHistory {
    cap: usize,
    #[serde(default)]
    patterns: Vec<BehavioralPattern>,
}

impl From<StoredHistory> for BehavioralHistory {
    fn from(stored: StoredHistory) -> Self {
        let mut history = BehavioralHistory::new(stored.cap);
        for pattern in stored.patterns {
            history.push(pattern);
        }
        history
    }
}

impl BehavioralHistory {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self { cap, patterns: VecDeque::with_capacity(cap) }
    }

    pub fn push(&mut self, pattern: BehavioralPattern) {
        while self.patterns.len() >= self.cap {
            self.patterns.pop_front();
        }
        self.patterns.push_back(pattern);
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BehavioralPattern> {
        self.patterns.iter()
    }

    pub fn to_vec(&self) -> Vec<BehavioralPattern> {
        self.patterns.iter().copied().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub solved: bool,
    /// Normalised performance for the puzzle, in [0,1].
    pub performance: f64,
    pub used_assistance: bool,
}

/// Per-session counters. Discarded when the play session ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub consecutive_failures: u32,
    /// Explicit engagement reading; falls back to the latest behavioral
    /// pattern's engagement score when absent.
    pub engagement_level: Option<f64>,
    pub outcomes: Vec<SessionOutcome>,
}

impl SessionContext {
    pub fn record(&mut self, outcome: SessionOutcome) {
        if outcome.solved {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
        }
        self.outcomes.push(outcome);
    }

    /// Successes among the last five outcomes.
    pub fn recent_success_count(&self) -> usize {
        self.outcomes.iter().rev().take(5).filter(|o| o.solved).count()
    }

    /// Newest minus oldest performance this session (0 with fewer than two).
    pub fn performance_trend(&self) -> f64 {
        match (self.outcomes.first(), self.outcomes.last()) {
            (Some(first), Some(last)) if self.outcomes.len() >= 2 => {
                last.performance - first.performance
            }
            _ => 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseState {
    NewUser,
    SeverelyStruggling,
    Struggling,
    FallingBack,
    Stable,
    Progressing,
    Excelling,
    ExpertDemanding,
}

impl BaseState {
    pub const ALL: [BaseState; 8] = [
        BaseState::NewUser,
        BaseState::SeverelyStruggling,
        BaseState::Struggling,
        BaseState::FallingBack,
        BaseState::Stable,
        BaseState::Progressing,
        BaseState::Excelling,
        BaseState::ExpertDemanding,
    ];

    pub fn is_struggling(self) -> bool {
        matches!(self, BaseState::Struggling | BaseState::SeverelyStruggling)
    }
}

impl fmt::Display for BaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BaseState::NewUser            => "new_user",
            BaseState::SeverelyStruggling => "severely_struggling",
            BaseState::Struggling         => "struggling",
            BaseState::FallingBack        => "falling_back",
            BaseState::Stable             => "stable",
            BaseState::Progressing        => "progressing",
            BaseState::Excelling          => "excelling",
            BaseState::ExpertDemanding    => "expert_demanding",
        };
        write!(f, "{}", s)
    }
}

/// Orthogonal flags layered over a base state. Declaration order is the
/// order their pool deltas are applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    ConfidenceCrisis,
    Disengaged,
    PowerDependent,
    Fatigued,
    SessionDecline,
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Modifier::ConfidenceCrisis => "confidence_crisis",
            Modifier::Disengaged       => "disengaged",
            Modifier::PowerDependent   => "power_dependent",
            Modifier::Fatigued         => "fatigued",
            Modifier::SessionDecline   => "session_decline",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModifierSet(BTreeSet<Modifier>);

impl ModifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, modifier: Modifier) {
        self.0.insert(modifier);
    }

    pub fn contains(&self, modifier: Modifier) -> bool {
        self.0.contains(&modifier)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates in application order.
    pub fn iter(&self) -> impl Iterator<Item = Modifier> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Modifier> for ModifierSet {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    pub base: BaseState,
    pub modifiers: ModifierSet,
}

impl UserState {
    pub fn new(base: BaseState) -> Self {
        Self { base, modifiers: ModifierSet::new() }
    }

    pub fn has(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(modifier)
    }
}

impl fmt::Display for UserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        for m in self.modifiers.iter() {
            write!(f, "+{}", m)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pool {
    ConfidenceBuilders,
    SkillDevelopment,
    ProgressiveChallenge,
    EngagementRecovery,
    ExploratoryNew,
}

impl Pool {
    /// Field order of a [`PoolDistribution`].
    pub const ALL: [Pool; 5] = [
        Pool::ConfidenceBuilders,
        Pool::SkillDevelopment,
        Pool::ProgressiveChallenge,
        Pool::EngagementRecovery,
        Pool::ExploratoryNew,
    ];

    pub fn index(self) -> usize {
        match self {
            Pool::ConfidenceBuilders   => 0,
            Pool::SkillDevelopment     => 1,
            Pool::ProgressiveChallenge => 2,
            Pool::EngagementRecovery   => 3,
            Pool::ExploratoryNew       => 4,
        }
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Pool::ConfidenceBuilders   => "confidence_builders",
            Pool::SkillDevelopment     => "skill_development",
            Pool::ProgressiveChallenge => "progressive_challenge",
            Pool::EngagementRecovery   => "engagement_recovery",
            Pool::ExploratoryNew       => "exploratory_new",
        };
        write!(f, "{}", s)
    }
}

/// Integer allocation of the candidate slots. Fields always sum to [`TOTAL_SLOTS`]
/// once produced by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDistribution {
    pub confidence_builders: u8,
    pub skill_development: u8,
    pub progressive_challenge: u8,
    pub engagement_recovery: u8,
    pub exploratory_new: u8,
}

impl PoolDistribution {
    pub const fn from_array(slots: [u8; 5]) -> Self {
        Self {
            confidence_builders: slots[0],
            skill_development: slots[1],
            progressive_challenge: slots[2],
            engagement_recovery: slots[3],
            exploratory_new: slots[4],
        }
    }

    pub fn as_array(&self) -> [u8; 5] {
        [
            self.confidence_builders,
            self.skill_development,
            self.progressive_challenge,
            self.engagement_recovery,
            self.exploratory_new,
        ]
    }

    pub fn get(&self, pool: Pool) -> u8 {
        self.as_array()[pool.index()]
    }

    pub fn total(&self) -> u32 {
        self.as_array().iter().map(|&v| u32::from(v)).sum()
    }
}

impl fmt::Display for PoolDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e] = self.as_array();
        write!(f, "{{{a},{b},{c},{d},{e}}}")
    }
}

// ---------------------------------------------------------------------------
// Candidates and producer bookkeeping
// ---------------------------------------------------------------------------

/// Structured descriptor of a produced puzzle. Consumed read-only by scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuzzleDna {
    pub puzzle_type: String,
    pub puzzle_subtype: String,
    pub discovered_difficulty: f64,
    pub skill_targets: Vec<String>,
    pub engagement_potential: f64,
}

impl PuzzleDna {
    /// Producer-reported easy variant (`easy`, `easy-…`).
    pub fn is_easy_variant(&self) -> bool {
        self.puzzle_subtype.starts_with("easy")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStage {
    /// The pool's own choice of type.
    Preferred,
    /// Another enabled type at the pool's target difficulty.
    Alternate,
    /// Random enabled type with no target difficulty.
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Produced,
    CannotProduce,
    TimedOut,
    /// Producer returned a type outside the enabled set.
    Disabled,
    /// Produced above the difficulty cap; the slot kept looking.
    OverCap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProduceAttempt {
    pub pool: Pool,
    pub puzzle_type: String,
    pub target_difficulty: Option<f64>,
    pub stage: AttemptStage,
    pub outcome: AttemptOutcome,
}

impl fmt::Display for ProduceAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pool, self.puzzle_type)
    }
}

/// How far the safety constraints had to be relaxed to keep a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintLevel {
    /// Difficulty cap plus easy-subtype preference (or no cap in force).
    Strict,
    /// Easy-subtype preference dropped, cap still enforced.
    CapOnly,
    /// Difficulty cap lifted.
    Uncapped,
}

/// Raw scoring terms, each in [0,1] before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub predicted_success: f64,
    pub predicted_engagement: f64,
    pub strategic_value: f64,
    pub variety_bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    /// Generation order; the final tie-break.
    pub index: usize,
    pub pool: Pool,
    pub stage: AttemptStage,
    pub puzzle: PuzzleDna,
    pub breakdown: ScoreBreakdown,
    /// Weighted contributions, same order as the breakdown fields.
    pub weighted: [f64; 4],
    pub bonus: f64,
    pub total: f64,
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Caller-owned rotation state, passed in and handed back on every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RotationCursor {
    pub position: usize,
    pub last_type: Option<String>,
    pub recent: VecDeque<String>,
}

impl RotationCursor {
    pub fn advanced(&self, selected_type: &str) -> Self {
        let mut next = self.clone();
        next.position = next.position.wrapping_add(1);
        next.last_type = Some(selected_type.to_string());
        if next.recent.len() == RECENT_TYPES_CAP {
            next.recent.pop_front();
        }
        next.recent.push_back(selected_type.to_string());
        next
    }

    pub fn recent_patterns(&self) -> Vec<String> {
        self.recent.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictedOutcomes {
    pub success_probability: f64,
    pub engagement_score: f64,
}

/// Auditable trail of one selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveContext {
    pub level: u32,
    pub skill_momentum: f64,
    pub pattern_strong_math_weak: bool,
    pub difficulty_cap: Option<f64>,
    pub constraint_level: ConstraintLevel,
    /// Successes among the session's last five outcomes.
    pub recent_successes: usize,
    /// Newest minus oldest performance this session.
    pub session_trend: f64,
    pub attempts: Vec<ProduceAttempt>,
    pub candidates: Vec<ScoredCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuzzleRecommendation {
    pub puzzle: PuzzleDna,
    pub source_pool: Pool,
    pub selection_reasoning: String,
    pub predicted_outcomes: PredictedOutcomes,
    pub pool_distribution: PoolDistribution,
    pub user_state: UserState,
    /// Cursor to pass into the next request.
    pub cursor: RotationCursor,
    pub context: AdaptiveContext,
}
