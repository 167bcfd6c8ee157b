//! MeshX error taxonomy.
//!
//! Mirrors the concept-level error taxonomy of the core: leaf operations
//! (queue, `send_fn`) return `MeshxError`, higher layers log and decide.
//! There is no `Success` variant — success is `Ok(())` / `Ok(T)`.

use thiserror::Error;

/// Error returned by MeshX core operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshxError {
    /// Parameter validation failed at an API boundary.
    #[error("invalid argument")]
    InvalidArg,
    /// Queue-full or allocation failure.
    #[error("no memory")]
    NoMem,
    /// Operation attempted before init or after teardown.
    #[error("invalid state")]
    InvalidState,
    /// Subscription / model id absent.
    #[error("not found")]
    NotFound,
    /// Opcode or model id outside the validated allow-list for the caller.
    #[error("not supported")]
    NotSupported,
    /// Retry budget exhausted for an in-flight request.
    #[error("timeout")]
    Timeout,
    /// Error surfaced by the transport SPI.
    #[error("platform error: {0}")]
    Platform(String),
}

/// Result alias used throughout the core.
pub type Result<T> = core::result::Result<T, MeshxError>;
