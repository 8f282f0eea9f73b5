// src/error.rs - Contractual errors; low-quality tracking never errors
use thiserror::Error;

/// The engine degrades low-quality tracking to zeroed results. Only a
/// contractual violation of the landmark-count precondition raises, because
/// the geometry is undefined otherwise.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("expected exactly 21 hand landmarks, got {actual}")]
    MalformedHand { actual: usize },
}
