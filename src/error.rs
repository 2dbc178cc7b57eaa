use thiserror::Error;

/// Result type for Snapmaker operations
pub type Result<T> = std::result::Result<T, SnapmakerError>;

/// Errors that can occur when talking to a Snapmaker printer
#[derive(Error, Debug)]
pub enum SnapmakerError {
    /// HTTP transport error (connection refused, DNS failure, timeout)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Device answered with a non-success HTTP status other than 401
    #[error("Device returned HTTP {status}")]
    HttpStatus {
        /// HTTP status code returned by the device
        status: u16,
    },

    /// I/O error on the discovery socket
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Device rejected the token (HTTP 401)
    #[error("Authorization failed: device rejected the token (HTTP 401)")]
    Unauthorized,

    /// Response could not be parsed or did not match the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Nobody approved the connection on the touchscreen in time
    #[error("Authorization timed out after {attempts} attempt(s) without approval")]
    AuthorizationTimeout {
        /// Number of connect attempts made before giving up
        attempts: u32,
    },

    /// Host cannot be turned into a device URL
    #[error("Invalid host: {0}")]
    InvalidHost(String),
}

impl SnapmakerError {
    /// Returns `true` for a 401 from the device.
    ///
    /// The token must be replaced through `authorize`; retrying with the same
    /// token will not help.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Returns `true` for network, timeout and non-401 HTTP failures.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::HttpStatus { .. } | Self::Io(_)
        )
    }

    /// Returns `true` when the device answered but the body was unusable.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedResponse(_))
    }

    /// Returns `true` when a request timed out rather than being refused.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout(),
            Self::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for SnapmakerError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(SnapmakerError::Unauthorized.is_authorization_failure());
        assert!(!SnapmakerError::Unauthorized.is_transport_failure());

        let status = SnapmakerError::HttpStatus { status: 503 };
        assert!(status.is_transport_failure());
        assert!(!status.is_timeout());

        let io = SnapmakerError::from(std::io::Error::from(std::io::ErrorKind::TimedOut));
        assert!(io.is_transport_failure());
        assert!(io.is_timeout());

        let json = SnapmakerError::from(serde_json::from_str::<u8>("x").unwrap_err());
        assert!(json.is_malformed());
    }
}
