//! Error taxonomy shared by all ClientChain crates.
//!
//! A policy veto is deliberately *not* an error — vetoes are modeled as a
//! `Verdict` in `clientchain-policy` and never travel through this enum.

use thiserror::Error;

/// All errors produced by the ClientChain platform.
#[derive(Debug, Error)]
pub enum ClientChainError {
    /// Malformed operator input (empty action list, bad template name, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown definition, execution, or subject id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transient failure talking to an SMS/email gateway or webhook target.
    #[error("channel error: {0}")]
    Channel(String),

    /// Unexpected handler failure inside a running execution (terminal).
    #[error("execution failure: {0}")]
    Execution(String),

    /// SQLite-level failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration file missing a required value or unparseable.
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientChainError>;
