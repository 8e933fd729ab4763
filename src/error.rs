//! Workflow error types.
//!
//! Distinguishes failures that abort a task run (transport, parse) from
//! domain rejections surfaced as the run's terminal message. Scheduling
//! waits (registration not yet open, seats not yet available) are never
//! errors; they are modeled as decision values inside the workflows.

use thiserror::Error;

/// Error from a task workflow step.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Network/TLS failure. Fatal to the current run.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Malformed HTML or JSON response. Fatal to the current run.
    #[error("malformed response: {0}")]
    Parse(String),

    /// Domain rejection from the portal (e.g. ineligible registration).
    /// Terminal for the run; the message becomes the task's status.
    #[error("{0}")]
    Rejected(String),
}

impl WorkflowError {
    /// Whether this error came from the network rather than the portal's
    /// decision logic.
    pub fn is_transport(&self) -> bool {
        matches!(self, WorkflowError::Transport(_))
    }
}
