/// Failures the engine reports beyond plain store I/O.
///
/// Public operations return `anyhow::Result`; match on these with
/// `err.downcast_ref::<TierError>()`.
#[derive(Debug, thiserror::Error)]
pub enum TierError {
    #[error("store error: {0}")]
    Store(String),

    #[error("{what} used after it was closed")]
    UseAfterClose { what: &'static str },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("engine poisoned by failed durable flush: {0}")]
    Poisoned(String),
}
