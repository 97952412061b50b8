//! Queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("job parse error: {0}")]
    Parse(String),

    #[error("schedule error: {0}")]
    Schedule(String),

    #[error("provider error: {0}")]
    Provider(String),
}
