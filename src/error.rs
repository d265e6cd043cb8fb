use thiserror::Error;

/// Failure classes surfaced by the trading pipeline.
///
/// The orchestration loop treats these differently: transient I/O and
/// malformed decisions skip the current cycle, state violations indicate a
/// bug and are logged loudly, persistence failures abort the in-flight
/// trade transition.
#[derive(Debug, Error)]
pub enum BotError {
    /// Network or upstream API failure after retries were exhausted.
    #[error("transient I/O failure: {0}")]
    Io(#[from] anyhow::Error),

    /// Not enough market data to compute what was asked for.
    #[error("insufficient market data: {0}")]
    InsufficientData(String),

    /// The model response could not be parsed into a valid decision.
    #[error("malformed decision: {0}")]
    MalformedDecision(String),

    /// A trade state transition that must never happen was attempted.
    #[error("trade state violation: {0}")]
    StateViolation(String),

    /// The trade store rejected a read or write.
    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
}
