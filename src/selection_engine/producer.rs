//! Puzzle producer seam and the built-in catalog producer.
//!
//! The engine only ever talks to a [`PuzzleProducer`]. Concrete content
//! generators live outside this crate; [`CatalogProducer`] is a deterministic
//! stand-in that derives a [`PuzzleDna`] from a fixed catalog, used by the
//! demo and the tests.

use std::future::Future;
use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::selection_engine::{helpers::clamp01, models::PuzzleDna};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProduceRequest {
    pub puzzle_type: String,
    /// `None` lets the producer pick any difficulty it supports.
    pub target_difficulty: Option<f64>,
    pub recent_patterns: Vec<String>,
}

/// Produces one candidate per call, or `None` when it cannot.
///
/// Implementations must be safe to call repeatedly with the same request and
/// must answer `None` (never panic) for types they do not know. The engine
/// bounds every call with a timeout, so a slow call only costs its own slot.
pub trait PuzzleProducer: Send + Sync {
    fn produce(&self, request: ProduceRequest) -> impl Future<Output = Option<PuzzleDna>> + Send;
}

impl<P: PuzzleProducer> PuzzleProducer for Arc<P> {
    fn produce(&self, request: ProduceRequest) -> impl Future<Output = Option<PuzzleDna>> + Send {
        (**self).produce(request)
    }
}

// ---------------------------------------------------------------------------
// Catalog producer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub puzzle_type: String,
    pub min_difficulty: f64,
    pub max_difficulty: f64,
    pub skill_targets: Vec<String>,
    pub base_engagement: f64,
}

impl CatalogEntry {
    fn new(puzzle_type: &str, range: (f64, f64), skills: &[&str], base_engagement: f64) -> Self {
        Self {
            puzzle_type: puzzle_type.to_string(),
            min_difficulty: range.0,
            max_difficulty: range.1,
            skill_targets: skills.iter().map(|s| s.to_string()).collect(),
            base_engagement,
        }
    }

    fn supports(&self, difficulty: f64) -> bool {
        (self.min_difficulty..=self.max_difficulty).contains(&difficulty)
    }
}

pub fn default_catalog() -> Vec<CatalogEntry> {
    let entry = CatalogEntry::new;
    vec![
        entry("pattern",          (0.05, 0.90), &["attention_control", "working_memory"], 0.75),
        entry("number-series",    (0.10, 0.95), &["working_memory", "processing_speed"], 0.55),
        entry("algebraic",        (0.30, 1.00), &["working_memory", "error_recovery"], 0.45),
        entry("arithmetic",       (0.00, 0.80), &["processing_speed"], 0.50),
        entry("logic-grid",       (0.20, 1.00), &["working_memory", "attention_control"], 0.65),
        entry("word-ladder",      (0.05, 0.85), &["processing_speed", "error_recovery"], 0.60),
        entry("spatial-rotation", (0.15, 0.95), &["attention_control"], 0.70),
        entry("memory-match",     (0.00, 0.70), &["working_memory"], 0.80),
    ]
}

/// Subtype label for a discovered difficulty.
pub fn subtype_for(difficulty: f64) -> &'static str {
    if difficulty < 0.35 {
        "easy"
    } else if difficulty < 0.7 {
        "standard"
    } else {
        "hard"
    }
}

/// Deterministic producer over a fixed catalog.
///
/// The same seed and request always yield the same DNA.
#[derive(Debug, Clone)]
pub struct CatalogProducer {
    entries: Vec<CatalogEntry>,
    seed: u64,
}

impl CatalogProducer {
    pub fn new(seed: u64) -> Self {
        Self::with_entries(default_catalog(), seed)
    }

    pub fn with_entries(entries: Vec<CatalogEntry>, seed: u64) -> Self {
        Self { entries, seed }
    }

    pub fn entry(&self, puzzle_type: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.puzzle_type == puzzle_type)
    }

    /// Synchronous core of [`PuzzleProducer::produce`].
    pub fn produce_now(&self, request: &ProduceRequest) -> Option<PuzzleDna> {
        let entry = self.entry(&request.puzzle_type)?;
        let mut rng = StdRng::seed_from_u64(request_seed(self.seed, request));

        let difficulty = match request.target_difficulty {
            Some(target) if !target.is_finite() || !entry.supports(target) => return None,
            Some(target) => {
                let jitter = rng.gen_range(-0.05..=0.05);
                (target + jitter).clamp(entry.min_difficulty, entry.max_difficulty)
            }
            None => rng.gen_range(entry.min_difficulty..=entry.max_difficulty),
        };

        let repeat_penalty = if request.recent_patterns.iter().any(|t| *t == entry.puzzle_type) {
            0.1
        } else {
            0.0
        };
        let jitter = rng.gen_range(-0.05..=0.05);
        let engagement = clamp01(entry.base_engagement + jitter - repeat_penalty);

        Some(PuzzleDna {
            puzzle_type: entry.puzzle_type.clone(),
            puzzle_subtype: subtype_for(difficulty).to_string(),
            discovered_difficulty: difficulty,
            skill_targets: entry.skill_targets.clone(),
            engagement_potential: engagement,
        })
    }
}

impl PuzzleProducer for CatalogProducer {
    fn produce(&self, request: ProduceRequest) -> impl Future<Output = Option<PuzzleDna>> + Send {
        let dna = self.produce_now(&request);
        std::future::ready(dna)
    }
}

/// FNV-1a over the producer seed and the request fields that shape the puzzle.
fn request_seed(seed: u64, request: &ProduceRequest) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let difficulty_bits = request.target_difficulty.map(f64::to_bits).unwrap_or(u64::MAX);
    let mut hash = OFFSET;
    for byte in seed
        .to_le_bytes()
        .into_iter()
        .chain(request.puzzle_type.bytes())
        .chain(difficulty_bits.to_le_bytes())
    {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
