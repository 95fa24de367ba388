//! Error types for ghpulse-core

use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors from a single upstream request.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The upstream answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not the JSON shape we expected.
    #[error("unexpected response from {url}: {source}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The HTTP client itself could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// HTTP status code, when the upstream answered at all.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for upstream requests.
pub type FetchResult<T> = Result<T, FetchError>;

/// Fatal errors from an activity run.
///
/// Anything that can go wrong after the repository set is known is absorbed
/// into [`Diagnostic`](crate::activity::Diagnostic)s instead.
#[derive(Error, Debug)]
pub enum ActivityError {
    /// Repository listing was refused (HTTP 403/429).
    #[error("rate limit exceeded; supply a GitHub token to continue")]
    RateLimited,

    /// The account does not exist (HTTP 404).
    #[error("account '{account}' not found; check the username and try again")]
    AccountNotFound {
        /// The account that was looked up.
        account: String,
    },

    /// Any other failure while listing repositories.
    #[error("failed to list repositories: {0}")]
    Fetch(FetchError),

    /// The window reaches before the earliest representable date.
    #[error("window of {days} days is out of range")]
    InvalidWindow {
        /// Requested window length.
        days: u64,
    },

    /// The HTTP client could not be set up.
    #[error(transparent)]
    Client(FetchError),
}

/// Result alias for activity runs.
pub type ActivityResult<T> = Result<T, ActivityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_exposed_only_for_status_errors() {
        let err = FetchError::Status {
            status: 502,
            url: "https://example.test".to_string(),
        };
        assert_eq!(err.status(), Some(502));
        assert_eq!(FetchError::Client("boom".to_string()).status(), None);
    }

    #[test]
    fn fatal_messages_are_user_facing() {
        let err = ActivityError::AccountNotFound {
            account: "octocat".to_string(),
        };
        assert!(err.to_string().contains("octocat"));
        assert!(ActivityError::RateLimited.to_string().contains("token"));
    }
}
