//! Error types for health checks.
//!
//! A failing probe is not an error: it makes the node unhealthy. Errors are
//! reserved for checks that cannot be performed at all (bad configuration,
//! no address).

use thiserror::Error;

/// Result type for healthkit operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value passed the schema but is unusable
    #[error("invalid '{field}' in {check} check: {message}")]
    Field {
        check: &'static str,
        field: &'static str,
        message: String,
    },

    /// A TCP endpoint refused or timed out
    #[error("{target} is unreachable: {message}")]
    Unreachable { target: String, message: String },

    /// An HTTP request failed or returned an error status
    #[error("HEAD {url} failed: {message}")]
    Http {
        url: String,
        status: Option<u16>,
        message: String,
    },
}

impl Error {
    pub(crate) fn field(check: &'static str, field: &'static str, message: impl Into<String>) -> Self {
        Self::Field {
            check,
            field,
            message: message.into(),
        }
    }

    pub(crate) fn http(url: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                url: url.to_string(),
                status: Some(code),
                message: format!("HTTP {code}"),
            },
            other => Self::Http {
                url: url.to_string(),
                status: None,
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::field("ports", "ports", "70000 is not a valid port");
        assert_eq!(e.to_string(), "invalid 'ports' in ports check: 70000 is not a valid port");

        let e = Error::http("http://10.0.0.1/", ureq::Error::StatusCode(503));
        assert_eq!(e.to_string(), "HEAD http://10.0.0.1/ failed: HTTP 503");
        assert!(matches!(e, Error::Http { status: Some(503), .. }));
    }
}
