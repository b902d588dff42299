use thiserror::Error;

use crate::selection_engine::models::ProduceAttempt;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Every slot's fallback ladder came back empty.
    #[error(
        "producer exhausted: no puzzle produced after {} attempts ({})",
        .attempts.len(),
        describe_attempts(.attempts)
    )]
    ProducerExhausted { attempts: Vec<ProduceAttempt> },
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("profile not found: {0}")]
    NotFound(String),
    #[error("profile store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("telemetry sink unavailable: {0}")]
    Unavailable(String),
}

fn describe_attempts(attempts: &[ProduceAttempt]) -> String {
    let mut seen: Vec<String> = Vec::new();
    for attempt in attempts {
        let key = attempt.to_string();
        if !seen.contains(&key) {
            seen.push(key);
        }
    }
    if seen.is_empty() {
        "none".to_string()
    } else {
        seen.join(", ")
    }
}
