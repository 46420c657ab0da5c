//! Error types for the pipeline.
//!
//! The error surface is deliberately small: the notification and deferred-work
//! contexts never propagate errors upward (nobody is waiting on them - drops
//! and allocation failures only touch counters and logs), so only the session
//! context and configuration loading produce values of [`Error`].

use thiserror::Error;

/// Convenience alias for results using the pipeline error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported to the session context and configuration callers.
#[derive(Debug, Error)]
pub enum Error {
    /// The concurrent-reader limit is reached. Reported immediately - the
    /// open path never queues for an admission slot.
    #[error("device busy: concurrent reader limit reached")]
    Busy,

    /// A blocked claim was interrupted (device shutdown). Retryable; the
    /// caller must re-issue the open.
    #[error("wait for a completed file was interrupted")]
    Interrupted,

    /// A tuning request that would strand active readers or disable the
    /// device entirely.
    #[error("invalid reader limit {requested}: must be >= 1 and >= {active} active readers")]
    InvalidLimit {
        /// The rejected limit.
        requested: usize,
        /// Readers currently holding sessions.
        active: usize,
    },

    /// Configuration file or environment parsing failed.
    #[error("configuration error")]
    Config(#[from] Box<figment::Error>),

    /// Configuration parsed but is semantically invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}
