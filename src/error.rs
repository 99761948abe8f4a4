//! Error types for BeamStore

use thiserror::Error;
use std::io;

/// Result type alias for BeamStore operations
pub type Result<T> = std::result::Result<T, BeamStoreError>;

/// Custom error types for BeamStore
#[derive(Error, Debug)]
pub enum BeamStoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Config file error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),
}

/// Reasons a frame is dropped by the read loop.
///
/// These never reach the client or the store actor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("{0} requires a key")]
    MissingKey(&'static str),
}
