//! Typed error kinds for every failure surface in the broker.
//!
//! Mirrors the four error kinds of the error-handling design: transport
//! (shared region), model (inference engine), and invariant violations.
//! Parse failures are deliberately not an error variant here — per the
//! contract, a JSON artifact that cannot be coerced even after repair
//! becomes the empty artifact, not an `Err`.

use thiserror::Error;

/// Failures from the shared-memory substrate (C1/C2/C3).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShmError {
    #[error("payload of {len} bytes exceeds slot capacity of {capacity} bytes")]
    TooLarge { len: usize, capacity: usize },

    #[error("region mutex not acquired within timeout")]
    MutexTimeout,

    #[error("slot payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("slot {0} is not in the expected state for this operation")]
    WrongState(usize),

    #[error("slot index {0} out of range")]
    SlotOutOfRange(usize),

    #[error("shared region '{0}' not found")]
    RegionNotFound(String),

    #[error("shared region operation failed: {0}")]
    Backend(String),
}

/// Failures surfaced by a `ModelEngine` implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("model inference failed: {0}")]
    InferenceFailed(String),

    #[error("model engine timed out")]
    Timeout,
}

/// Top-level broker error. Workers and writers catch every variant and
/// translate it into either an empty-artifact success-shell response or a
/// failure response — no variant here is ever allowed to escape a worker
/// or writer's run loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("transport error: {0}")]
    Transport(#[from] ShmError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("invariant violation: {0}")]
    Invariant(String),
}
