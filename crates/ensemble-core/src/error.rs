use thiserror::Error;

/// Failures that can escape the apply entry point.
///
/// Per-unit failures never surface here; they are recorded as result
/// information on the unit and in the set result. Only abandoning the whole
/// operation does.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApplyError {
    /// The cancellation token fired; the apply was abandoned at the next poll
    #[error("configuration set apply was cancelled")]
    Cancelled,
}
