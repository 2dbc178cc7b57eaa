use crate::config::AuthorizeConfig;
use crate::error::{Result, SnapmakerError};
use crate::printer_connection::{ConnectReply, PrinterConnection};
use std::fmt;
use tokio::time::sleep;

/// Token held by a client and whether the printer has rejected it.
///
/// `token == None && !invalid` means the client was never authorized.
/// `token == Some(_) && invalid` means the printer answered 401 and the token
/// must be replaced through `authorize`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TokenState {
    token: Option<String>,
    invalid: bool,
}

impl TokenState {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
            invalid: false,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// The token, unless there is none or it has been rejected
    pub fn usable(&self) -> Option<&str> {
        if self.invalid {
            None
        } else {
            self.token()
        }
    }
}

impl fmt::Debug for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenState")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("invalid", &self.invalid)
            .finish()
    }
}

/// Where the approval handshake currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
enum AuthPhase {
    /// Asking for a token, or re-checking a previously stored one
    Requesting { candidate: Option<String> },

    /// Waiting for someone to confirm on the touchscreen
    Polling { token: Option<String> },

    Validated(String),
}

impl AuthPhase {
    /// Token to send with the next connect call
    fn candidate(&self) -> Option<&str> {
        match self {
            Self::Requesting { candidate } => candidate.as_deref(),
            Self::Polling { token } => token.as_deref(),
            Self::Validated(token) => Some(token),
        }
    }

    fn advance(self, reply: Result<ConnectReply>) -> Self {
        match reply {
            Ok(ConnectReply::Token(token)) if self.candidate() == Some(token.as_str()) => {
                Self::Validated(token)
            }
            Ok(ConnectReply::Token(token)) => {
                tracing::info!("Printer issued a token, waiting for approval on the touchscreen");
                Self::Polling { token: Some(token) }
            }
            Ok(ConnectReply::Pending) => {
                tracing::debug!("Approval still pending");
                Self::Polling {
                    token: self.candidate().map(str::to_owned),
                }
            }
            Err(SnapmakerError::Unauthorized) => {
                tracing::warn!("Printer rejected the token, requesting a new one");
                Self::Requesting { candidate: None }
            }
            Err(e) => {
                tracing::warn!("Connect attempt failed: {}", e);
                self
            }
        }
    }
}

/// Owns the token of one printer and runs the approval handshake.
#[derive(Debug, Clone, Default)]
pub struct TokenManager {
    state: TokenState,
}

impl TokenManager {
    /// Start with a previously persisted token, if any
    pub fn new(token: Option<String>) -> Self {
        Self {
            state: TokenState::new(token),
        }
    }

    pub fn state(&self) -> &TokenState {
        &self.state
    }

    pub fn token(&self) -> Option<&str> {
        self.state.token()
    }

    pub fn is_invalid(&self) -> bool {
        self.state.is_invalid()
    }

    pub fn usable_token(&self) -> Option<&str> {
        self.state.usable()
    }

    /// Record that the printer rejected the token.
    ///
    /// The token value is kept. Nothing is retried; a new token has to come
    /// from `authorize`.
    pub fn mark_invalid(&mut self) {
        if !self.state.invalid {
            tracing::warn!("Token marked invalid, re-authorization required");
        }
        self.state.invalid = true;
    }

    /// Store a freshly validated token and clear the invalid flag.
    pub fn accept(&mut self, token: String) {
        self.state = TokenState {
            token: Some(token),
            invalid: false,
        };
    }

    /// Ask the printer whether `token` is approved. A 401 counts as "no".
    pub async fn validate(&self, connection: &PrinterConnection, token: &str) -> Result<bool> {
        match connection.request_connect(Some(token)).await {
            Ok(ConnectReply::Token(echoed)) => Ok(echoed == token),
            Ok(ConnectReply::Pending) | Err(SnapmakerError::Unauthorized) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Obtain an approved token, waiting for the user to confirm on the printer.
    ///
    /// Starts by re-checking the current token when it is still usable,
    /// otherwise requests a new one. Every connect call, successful or not,
    /// consumes one of `max_attempts`; calls are spaced by `poll_interval`.
    /// Transport hiccups while polling are logged and tolerated.
    ///
    /// The returned future can take up to `max_attempts * poll_interval`.
    /// Dropping it abandons the handshake without side effects. The stored
    /// token is not touched; use [`accept`](Self::accept) with the result.
    pub async fn authorize(
        &self,
        connection: &PrinterConnection,
        config: &AuthorizeConfig,
    ) -> Result<String> {
        let mut phase = AuthPhase::Requesting {
            candidate: self.usable_token().map(str::to_owned),
        };

        for attempt in 1..=config.max_attempts {
            if attempt > 1 {
                sleep(config.poll_interval).await;
            }

            tracing::debug!(
                "Connect attempt {}/{} to {}",
                attempt,
                config.max_attempts,
                connection.host()
            );
            let reply = connection.request_connect(phase.candidate()).await;

            phase = phase.advance(reply);
            if let AuthPhase::Validated(token) = phase {
                tracing::info!(
                    "Authorized with {} after {} attempt(s)",
                    connection.host(),
                    attempt
                );
                return Ok(token);
            }
        }

        tracing::error!(
            "No approval from {} after {} attempt(s)",
            connection.host(),
            config.max_attempts
        );
        Err(SnapmakerError::AuthorizationTimeout {
            attempts: config.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(value: &str) -> Result<ConnectReply> {
        Ok(ConnectReply::Token(value.to_string()))
    }

    #[test]
    fn fresh_request_moves_to_polling() {
        let phase = AuthPhase::Requesting { candidate: None }.advance(token("abc"));
        assert_eq!(phase, AuthPhase::Polling { token: Some("abc".to_string()) });
    }

    #[test]
    fn echoed_token_is_validated() {
        let phase = AuthPhase::Polling { token: Some("abc".to_string()) }.advance(token("abc"));
        assert_eq!(phase, AuthPhase::Validated("abc".to_string()));

        let phase = AuthPhase::Requesting { candidate: Some("saved".to_string()) }.advance(token("saved"));
        assert_eq!(phase, AuthPhase::Validated("saved".to_string()));
    }

    #[test]
    fn pending_keeps_polling_with_same_token() {
        let phase = AuthPhase::Polling { token: Some("abc".to_string()) }
            .advance(Ok(ConnectReply::Pending));
        assert_eq!(phase, AuthPhase::Polling { token: Some("abc".to_string()) });
    }

    #[test]
    fn transport_failure_keeps_phase() {
        let polling = AuthPhase::Polling { token: Some("abc".to_string()) };
        let phase = polling
            .clone()
            .advance(Err(SnapmakerError::HttpStatus { status: 503 }));
        assert_eq!(phase, polling);
    }

    #[test]
    fn rejection_restarts_request() {
        let phase = AuthPhase::Polling { token: Some("abc".to_string()) }
            .advance(Err(SnapmakerError::Unauthorized));
        assert_eq!(phase, AuthPhase::Requesting { candidate: None });
    }

    #[test]
    fn token_state_flags() {
        let mut manager = TokenManager::new(None);
        assert_eq!(manager.token(), None);
        assert!(!manager.is_invalid());

        manager.accept("abc".to_string());
        assert_eq!(manager.usable_token(), Some("abc"));

        manager.mark_invalid();
        assert!(manager.is_invalid());
        assert_eq!(manager.token(), Some("abc"));
        assert_eq!(manager.usable_token(), None);

        manager.accept("def".to_string());
        assert!(!manager.is_invalid());
        assert_eq!(manager.usable_token(), Some("def"));
    }

    #[test]
    fn debug_output_hides_token() {
        let state = TokenState::new(Some("secret-token".to_string()));
        assert!(!format!("{state:?}").contains("secret-token"));
    }
}
