// src/error.rs
//! Error types shared across the monitoring pipeline

use std::path::PathBuf;

use thiserror::Error;

use crate::core::monitor::SessionState;

/// Errors raised by the library.
///
/// None of these are fatal to the monitoring session: the event path logs
/// them and carries on with the next event.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("history store error: {0}")]
    History(#[from] sqlx::Error),

    #[error("policy store I/O error at {path}: {source}")]
    PolicyIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("monitor is {actual:?}, expected {expected:?}")]
    InvalidState {
        actual: SessionState,
        expected: SessionState,
    },

    #[error("no async runtime available: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Failures reported by host collaborators (process control, notifications).
///
/// These are best-effort requests; callers report and move on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("{0} is protected by the host and cannot be terminated")]
    Protected(String),

    #[error("no running process for {0}")]
    NotRunning(String),

    #[error("host surface unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T, E = GuardError> = std::result::Result<T, E>;
