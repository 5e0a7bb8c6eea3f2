// ── Kioo Atoms: Error Types ──────────────────────────────────────────────
// Single canonical error enum for the crate, built with `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by domain (Invalid, Transient, ...).
//   • `SafetyCritical` is intentionally not a variant here: a critical
//     cultural finding is a normal, successfully-produced value that
//     downstream code must act on, not a failure. Modeling it as an error
//     would let it be silently absorbed by a `?` somewhere.
//   • No variant carries transcript text, acoustic samples, or key
//     material in its message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Shape/type mismatch from a caller. Reject synchronously; never
    /// advance state.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// A dependency (model, storage, KB) timed out or returned a
    /// retryable error. Caller decides: retry with backoff, then degrade.
    #[error("transient dependency failure: {0}")]
    Transient(String),

    /// Version mismatch on a UIConfig upsert (concurrent builder
    /// instances raced). The losing builder's result must be discarded.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Malformed KB, missing encryption material, or other startup-time
    /// misconfiguration. The affected subsystem halts rather than serving
    /// partial functionality.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Key derivation or AEAD operation failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// JSON serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }
}
