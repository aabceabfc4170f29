use thiserror::Error;

/// Errors that can occur during frame capture operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The source has no more frames. Ends the stream gracefully.
    #[error("source exhausted")]
    SourceExhausted,

    #[error("source failed: {0}")]
    SourceFailed(String),

    /// No free slot exists outside the assigned roles. Never expected with a
    /// correctly sized pool.
    #[error("buffer pool invariant violated: {0}")]
    PoolInvariantViolation(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("producer thread failed: {0}")]
    ThreadFailed(String),

    #[error("timeout")]
    Timeout,
}

impl CaptureError {
    /// Whether this error marks the normal end of a finite stream.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::SourceExhausted)
    }
}
