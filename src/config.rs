use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

/// UDP port printers listen on for discovery probes
pub const DISCOVER_PORT: u16 = 20054;

/// HTTP port of the printer's local API
pub const API_PORT: u16 = 8080;

/// Settings for UDP discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Destination port for the probe
    pub port: u16,

    /// Where the probe is sent (limited broadcast by default)
    pub broadcast_addr: Ipv4Addr,

    /// How long to listen for replies after each probe
    pub timeout: Duration,

    /// Number of probe attempts before giving up
    pub max_retries: u32,

    /// Stop listening early once this many distinct printers replied in one attempt (0 = no cap)
    pub max_responses_per_retry: usize,

    /// Pause before the second attempt; doubles after every further attempt
    pub initial_backoff: Duration,

    /// Upper bound for the pause between attempts
    pub max_backoff: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: DISCOVER_PORT,
            broadcast_addr: Ipv4Addr::BROADCAST,
            timeout: Duration::from_secs(1),
            max_retries: 5,
            max_responses_per_retry: 32,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(4),
        }
    }
}

impl DiscoveryConfig {
    /// Pause to apply before attempt number `attempt` (zero-based).
    ///
    /// Attempt 0 never waits: 0, 250ms, 500ms, 1s, 2s, 4s, 4s, ...
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Settings for the touchscreen approval loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizeConfig {
    /// Connect attempts before reporting `AuthorizationTimeout`
    pub max_attempts: u32,

    /// Pause between attempts
    pub poll_interval: Duration,
}

impl Default for AuthorizeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            poll_interval: Duration::from_secs(10),
        }
    }
}

impl AuthorizeConfig {
    /// Worst-case time `authorize` can take, ignoring request latency.
    pub fn ceiling(&self) -> Duration {
        self.poll_interval
            .checked_mul(self.max_attempts)
            .unwrap_or(Duration::MAX)
    }
}

/// Per-device client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// HTTP API port
    pub api_port: u16,

    /// TCP connection establishment timeout; kept short since the printer is on the LAN
    pub connect_timeout: Duration,

    /// Total time allowed for one request including the body
    pub request_timeout: Duration,

    pub discovery: DiscoveryConfig,

    pub authorize: AuthorizeConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_port: API_PORT,
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            discovery: DiscoveryConfig::default(),
            authorize: AuthorizeConfig::default(),
        }
    }
}
