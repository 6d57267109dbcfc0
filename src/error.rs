//! Error types for AtlasMeta
//!
//! Provides a unified error type for all operations.
//!
//! Not every failure here is recoverable: errors raised while applying a
//! committed log entry are escalated through the state machine's fail-stop
//! path instead of being returned (see `fsm`).

use thiserror::Error;

/// Result type alias using AtlasError
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Unified error type for AtlasMeta operations
#[derive(Debug, Error)]
pub enum AtlasError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Store is closed: {0}")]
    StoreClosed(String),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A replicated command (or batch envelope) could not be decoded
    #[error("Command decode error: {0}")]
    Decode(String),

    // -------------------------------------------------------------------------
    // Snapshot Errors
    // -------------------------------------------------------------------------
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// A directory rename during snapshot install failed.
    ///
    /// Carries the raw I/O error so the operator sees exactly what the
    /// filesystem reported.
    #[error("Snapshot swap failed during {step}: {source}")]
    SnapshotSwap {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Handler Errors
    // -------------------------------------------------------------------------
    #[error("Handler error: {0}")]
    Handler(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
