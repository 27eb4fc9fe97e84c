use thiserror::Error;

/// A task field that cannot be accepted as submitted. The message is shown
/// to the page as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Task name is required")]
    MissingName,
    #[error("Unknown priority `{0}`")]
    UnknownPriority(String),
    #[error("Invalid deadline `{0}`")]
    InvalidDeadline(String),
    #[error("Invalid timestamp `{0}`")]
    InvalidTimestamp(String),
}
