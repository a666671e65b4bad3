use std::{error::Error as StdError, time::Duration};

/// Crate-wide result type for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors returned by bridge collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An external call did not finish within its deadline.
    #[error("{operation} timed out after {}s", timeout.as_secs())]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// A remote resource answered with a non-success status.
    #[error("unexpected HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// A remote resource answered with no content.
    #[error("empty response body for {url}")]
    EmptyBody { url: String },

    /// Collaborator is not connected or not ready.
    #[error("unavailable: {message}")]
    Unavailable { message: String },

    /// Wrapped source error from a transport crate.
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}

impl Error {
    #[must_use]
    pub fn timeout(operation: &'static str, timeout: Duration) -> Self {
        Self::Timeout { operation, timeout }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
