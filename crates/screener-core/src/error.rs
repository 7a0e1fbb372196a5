use thiserror::Error;

/// Error taxonomy for the screening pipeline (kinds, not exhaustive causes).
/// Per-symbol instances never propagate past the orchestrator's fan-out
/// boundary — they are converted into a dropped-symbol outcome and logged.
#[derive(Error, Debug)]
pub enum ScreeningError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited")]
    RateLimited,

    #[error("not found")]
    NotFound,

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cache error: {0}")]
    Cache(String),
}
