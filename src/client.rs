use crate::config::{AuthorizeConfig, ClientConfig};
use crate::discovery::Discovery;
use crate::error::Result;
use crate::printer_connection::PrinterConnection;
use crate::protocol::{filter_sensitive, StatusPayload};
use crate::token::{TokenManager, TokenState};
use crate::types::{DeviceSnapshot, DiscoveryRecord};
use serde_json::{Map, Value};
use std::net::Ipv4Addr;

/// `last_error` of the snapshot produced when no usable token is held
pub const NOT_AUTHORIZED: &str = "not authorized";

/// Client for one Snapmaker printer on the local network
///
/// Holds the printer's token and its last known [`DeviceSnapshot`]. Create
/// one client per printer. `update` never fails: problems show up as an
/// offline snapshot with `last_error` set.
///
/// # Example
///
/// ```no_run
/// use snapmaker_lan::{ClientConfig, DeviceClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut client = DeviceClient::new("192.168.1.50", ClientConfig::default())?;
///
///     // Blocks until someone taps "Yes" on the printer's touchscreen
///     let token = client.authorize().await?;
///     println!("persist this token: {token}");
///
///     let snapshot = client.update().await;
///     println!("{} {:.1}%", snapshot.status, snapshot.progress_percent);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct DeviceClient {
    connection: PrinterConnection,
    config: ClientConfig,
    tokens: TokenManager,
    snapshot: DeviceSnapshot,
    model: Option<String>,
    raw_status: Map<String, Value>,
}

impl DeviceClient {
    /// Create a client that has never been authorized
    pub fn new(host: impl Into<String>, config: ClientConfig) -> Result<Self> {
        Self::with_token(host, None, config)
    }

    /// Create a client seeded with a token persisted by the caller
    pub fn with_token(
        host: impl Into<String>,
        token: Option<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let connection = PrinterConnection::new(host, &config)?;

        Ok(Self {
            connection,
            config,
            tokens: TokenManager::new(token),
            snapshot: DeviceSnapshot::offline(NOT_AUTHORIZED),
            model: None,
            raw_status: Map::new(),
        })
    }

    /// Find printers on the network using this client's discovery settings
    pub async fn discover(&self) -> Vec<DiscoveryRecord> {
        Discovery::with_config(self.config.discovery.clone())
            .discover()
            .await
    }

    /// Check that this printer answers discovery and remember its model.
    ///
    /// Only possible when the host is an IPv4 address.
    pub async fn probe(&mut self) -> Option<DiscoveryRecord> {
        let Ok(address) = self.connection.host().parse::<Ipv4Addr>() else {
            tracing::warn!("Cannot probe '{}': not an IPv4 address", self.connection.host());
            return None;
        };

        let record = Discovery::with_config(self.config.discovery.clone())
            .probe(address)
            .await?;
        self.model = Some(record.model.clone());
        Some(record)
    }

    /// Run the approval handshake with the configured attempt budget.
    ///
    /// See [`authorize_with`](Self::authorize_with).
    pub async fn authorize(&mut self) -> Result<String> {
        let config = self.config.authorize.clone();
        self.authorize_with(&config).await
    }

    /// Obtain and store a new token.
    ///
    /// The printer shows a confirmation prompt; this waits until it is
    /// accepted or `config.max_attempts` connect calls have been made. On
    /// success the token is stored, the invalid flag is cleared and the token
    /// is returned so the caller can persist it. If the future is dropped
    /// early the previous token state is left as it was.
    pub async fn authorize_with(&mut self, config: &AuthorizeConfig) -> Result<String> {
        let token = self.tokens.authorize(&self.connection, config).await?;
        self.tokens.accept(token.clone());
        Ok(token)
    }

    /// Check whether the stored token is still approved, without changing state
    pub async fn validate_token(&self) -> Result<bool> {
        match self.tokens.token() {
            Some(token) => self.tokens.validate(&self.connection, token).await,
            None => Ok(false),
        }
    }

    /// Fetch the current status and replace the snapshot.
    ///
    /// A 401 marks the token invalid; network failures and unreadable
    /// payloads leave the token alone. Either way the result is an offline
    /// snapshot describing the failure.
    pub async fn update(&mut self) -> DeviceSnapshot {
        let Some(token) = self.tokens.usable_token().map(str::to_owned) else {
            tracing::debug!("Skipping status request for {}: {}", self.host(), NOT_AUTHORIZED);
            return self.go_offline(NOT_AUTHORIZED.to_string());
        };

        match self.fetch(&token).await {
            Ok(snapshot) => {
                self.snapshot = snapshot;
                self.snapshot.clone()
            }
            Err(e) => {
                if e.is_authorization_failure() {
                    self.tokens.mark_invalid();
                }
                tracing::warn!("Status update from {} failed: {}", self.host(), e);
                self.go_offline(e.to_string())
            }
        }
    }

    fn go_offline(&mut self, reason: String) -> DeviceSnapshot {
        self.raw_status.clear();
        self.snapshot = DeviceSnapshot::offline(reason);
        self.snapshot.clone()
    }

    async fn fetch(&mut self, token: &str) -> Result<DeviceSnapshot> {
        let raw = self.connection.request_status(token).await?;
        let payload = StatusPayload::from_raw(&raw)?;
        let snapshot = DeviceSnapshot::from_payload(&payload);

        tracing::debug!(
            "{} is {} ({:.1}%, {} extruder)",
            self.host(),
            snapshot.status,
            snapshot.progress_percent,
            snapshot.toolhead_type.map_or("unknown".to_string(), |t| t.to_string())
        );
        self.raw_status = filter_sensitive(&raw);
        Ok(snapshot)
    }

    pub fn host(&self) -> &str {
        self.connection.host()
    }

    /// Model reported by the last successful probe
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Last snapshot produced by `update`, without contacting the printer
    pub fn snapshot(&self) -> &DeviceSnapshot {
        &self.snapshot
    }

    pub fn is_online(&self) -> bool {
        !self.snapshot.is_offline()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.snapshot.last_error.as_deref()
    }

    /// `true` once the printer has rejected the token; call `authorize` to replace it
    pub fn token_invalid(&self) -> bool {
        self.tokens.is_invalid()
    }

    /// Current token, for persistence by the caller
    pub fn token(&self) -> Option<&str> {
        self.tokens.token()
    }

    pub fn token_state(&self) -> &TokenState {
        self.tokens.state()
    }

    /// Last successful status payload with sensitive keys removed, for diagnostics.
    /// Empty while offline.
    pub fn raw_status(&self) -> &Map<String, Value> {
        &self.raw_status
    }
}
