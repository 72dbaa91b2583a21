use thiserror::Error;

/// Failures surfaced by accumulator, update, and key-generation operations.
///
/// Errors are reported to the immediate caller; nothing is retried
/// internally, and the accumulation is only mutated once an operation can no
/// longer fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The witness does not verify against the current accumulation.
    #[error("witness does not match the current accumulation")]
    WitnessInvalid,

    /// The operation needs the private exponent, but the accumulator was
    /// constructed from a public key only.
    #[error("operation requires the private exponent")]
    SecretRequired,

    /// A refreshed witness does not match the update's snapshot, meaning the
    /// input witness was computed against a different accumulation.
    #[error("refreshed witness does not match the update snapshot")]
    UpdateMismatch,

    /// An undo was requested for a prime that was never absorbed.
    #[error("prime was never absorbed into this update")]
    InvalidDivision,

    /// A public input was out of range or otherwise malformed.
    #[error("bad argument: {0}")]
    BadArgument(&'static str),

    /// An internal invariant was violated.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(&'static str),
}
