use std::fmt;

/// Errors surfaced by the session collaborator.
///
/// Classification drives recovery: authentication failures are retried a
/// bounded number of times and then abort the worker, fetch failures are
/// isolated per series and feed the failed set. A session that silently lost
/// its login is reported through `is_authenticated`, not through an error.
#[derive(Debug)]
pub enum FetchError {
    /// Login failed or could not be verified.
    Authentication { reason: String },
    /// A single series/season fetch failed.
    Fetch { link: String, reason: String },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Authentication { reason } => {
                write!(f, "authentication failed: {reason}")
            }
            FetchError::Fetch { link, reason } => {
                write!(f, "fetch failed for {link}: {reason}")
            }
        }
    }
}

impl std::error::Error for FetchError {}
