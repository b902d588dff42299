use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::selection_engine::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Hard difficulty cap for `new_user`.
    pub new_user_cap: f64,
    /// Hard difficulty cap for `struggling` and `severely_struggling`.
    pub struggling_cap: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            new_user_cap: 0.4,
            struggling_cap: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub success_weight: f64,
    pub engagement_weight: f64,
    pub strategic_weight: f64,
    pub variety_weight: f64,
    pub strength_bonus: f64,
    pub engagement_bonus: f64,
    pub confidence_bonus: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            success_weight: 0.4,
            engagement_weight: 0.3,
            strategic_weight: 0.2,
            variety_weight: 0.1,
            strength_bonus: 0.1,
            engagement_bonus: 0.15,
            confidence_bonus: 0.15,
        }
    }
}

/// Type names feeding the pattern-strong/math-weak detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    pub pattern_types: Vec<String>,
    pub math_types: Vec<String>,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            pattern_types: vec!["pattern".to_string()],
            math_types: vec![
                "number-series".to_string(),
                "algebraic".to_string(),
                "arithmetic".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub behavioral_window_cap: usize,
    /// Consecutive strictly-falling performances that count as fatigue.
    pub fatigue_window: usize,
    /// First-half minus second-half mean performance that counts as decline.
    pub decline_threshold: f64,
    pub assistance_window: usize,
    pub crisis_failures: u32,
    pub disengaged_below: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            behavioral_window_cap: 20,
            fatigue_window: 4,
            decline_threshold: 0.15,
            assistance_window: 10,
            crisis_failures: 3,
            disengaged_below: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub enabled_types: Vec<String>,
    pub producer_timeout_ms: u64,
    pub max_alternate_types: usize,
    pub safety: SafetyConfig,
    pub scoring: ScoringConfig,
    pub persona: PersonaConfig,
    pub session: SessionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled_types: [
                "pattern",
                "number-series",
                "algebraic",
                "arithmetic",
                "logic-grid",
                "word-ladder",
                "spatial-rotation",
                "memory-match",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            producer_timeout_ms: 250,
            max_alternate_types: 3,
            safety: SafetyConfig::default(),
            scoring: ScoringConfig::default(),
            persona: PersonaConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PUZZLE_ENGINE_ENABLED_TYPES") {
            let types: Vec<String> = val
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
            if !types.is_empty() {
                config.enabled_types = types;
            }
        }
        if let Ok(val) = std::env::var("PUZZLE_ENGINE_PRODUCER_TIMEOUT_MS") {
            config.producer_timeout_ms = val.parse().unwrap_or(config.producer_timeout_ms);
        }
        if let Ok(val) = std::env::var("PUZZLE_ENGINE_NEW_USER_CAP") {
            config.safety.new_user_cap = val.parse().unwrap_or(config.safety.new_user_cap);
        }
        if let Ok(val) = std::env::var("PUZZLE_ENGINE_STRUGGLING_CAP") {
            config.safety.struggling_cap = val.parse().unwrap_or(config.safety.struggling_cap);
        }

        config
    }

    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|err| EngineError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.enabled_types.is_empty() {
            return Err(EngineError::InvalidConfig("enabled_types is empty".to_string()));
        }
        if self.producer_timeout_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "producer_timeout_ms must be positive".to_string(),
            ));
        }
        for (name, cap) in [
            ("new_user_cap", self.safety.new_user_cap),
            ("struggling_cap", self.safety.struggling_cap),
        ] {
            if !(0.0..=1.0).contains(&cap) {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be within [0,1], got {cap}"
                )));
            }
        }
        Ok(())
    }

    pub fn producer_timeout(&self) -> Duration {
        Duration::from_millis(self.producer_timeout_ms)
    }

    pub fn is_enabled(&self, puzzle_type: &str) -> bool {
        self.enabled_types.iter().any(|t| t == puzzle_type)
    }
}
