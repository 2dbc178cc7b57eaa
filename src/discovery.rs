use crate::config::DiscoveryConfig;
use crate::error::Result;
use crate::protocol::{parse_discovery_reply, DISCOVER_MESSAGE};
use crate::types::DiscoveryRecord;
use std::collections::{BTreeMap, BTreeSet};
use std::net::{Ipv4Addr, SocketAddrV4};
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout_at, Instant};

const BUFFER_SIZE: usize = 1024;

/// UDP broadcast discovery for Snapmaker printers
///
/// Each attempt broadcasts the `discover` probe and listens for replies for
/// the configured window. All `max_retries` attempts are made, with
/// exponential backoff in between, so a printer whose reply was lost once is
/// still picked up by a later attempt. Replies are deduplicated by address
/// across attempts.
///
/// # Example
///
/// ```no_run
/// use snapmaker_lan::Discovery;
///
/// #[tokio::main]
/// async fn main() {
///     for printer in Discovery::new().discover().await {
///         println!("{} at {} ({})", printer.model, printer.address, printer.reported_status);
///     }
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    config: DiscoveryConfig,
}

impl Discovery {
    /// Create a discovery transport with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Find all printers that answer the probe.
    ///
    /// Never fails: socket errors are logged and whatever was collected so
    /// far is returned, which is an empty list when nobody answered.
    pub async fn discover(&self) -> Vec<DiscoveryRecord> {
        let mut found = BTreeMap::new();
        let cap = match self.config.max_responses_per_retry {
            0 => usize::MAX,
            n => n,
        };

        if let Err(e) = self.run(&mut found, cap, false, |_| true).await {
            tracing::error!("Discovery aborted: {}", e);
        }

        if found.is_empty() {
            tracing::info!(
                "No printers responded after {} attempt(s)",
                self.config.max_retries
            );
        } else {
            tracing::info!("Discovered {} printer(s)", found.len());
        }

        found.into_values().collect()
    }

    /// Check whether the printer at `host` answers the probe.
    ///
    /// Replies from other printers on the network are ignored.
    pub async fn probe(&self, host: Ipv4Addr) -> Option<DiscoveryRecord> {
        let mut found = BTreeMap::new();

        if let Err(e) = self
            .run(&mut found, 1, true, |record| {
                let matches = record.address == host;
                if !matches {
                    tracing::debug!("Ignoring reply from {} while probing {}", record.address, host);
                }
                matches
            })
            .await
        {
            tracing::error!("Probe of {} aborted: {}", host, e);
        }

        let record = found.remove(&host);
        if record.is_none() {
            tracing::info!("Printer at {} did not answer the probe", host);
        }
        record
    }

    /// Runs the attempt loop, ending early after the first answered attempt
    /// when `stop_when_found` is set. The socket lives for the duration of
    /// this call only and is closed on every return path.
    async fn run<F>(
        &self,
        found: &mut BTreeMap<Ipv4Addr, DiscoveryRecord>,
        cap: usize,
        stop_when_found: bool,
        accept: F,
    ) -> Result<()>
    where
        F: Fn(&DiscoveryRecord) -> bool,
    {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;

        let destination = SocketAddrV4::new(self.config.broadcast_addr, self.config.port);

        for attempt in 0..self.config.max_retries {
            let backoff = self.config.backoff_before(attempt);
            if !backoff.is_zero() {
                tracing::debug!("Retrying discovery in {:?}", backoff);
                sleep(backoff).await;
            }

            if let Err(e) = socket.send_to(DISCOVER_MESSAGE, destination).await {
                tracing::warn!(
                    "Failed to send discovery probe to {} (attempt {}/{}): {}",
                    destination,
                    attempt + 1,
                    self.config.max_retries,
                    e
                );
                continue;
            }
            tracing::debug!(
                "Sent discovery probe to {} (attempt {}/{})",
                destination,
                attempt + 1,
                self.config.max_retries
            );

            let known = found.len();
            match self.collect_replies(&socket, found, cap, &accept).await {
                Ok(answered) => {
                    tracing::debug!(
                        "Attempt {}: {} printer(s) answered, {} new",
                        attempt + 1,
                        answered,
                        found.len() - known
                    );
                    if answered > 0 && stop_when_found {
                        return Ok(());
                    }
                }
                Err(e) => tracing::warn!("Discovery attempt {} failed: {}", attempt + 1, e),
            }
        }

        Ok(())
    }

    /// Listen until the window closes or `cap` distinct printers answered.
    /// Returns the number of distinct accepted replies in this attempt.
    async fn collect_replies<F>(
        &self,
        socket: &UdpSocket,
        found: &mut BTreeMap<Ipv4Addr, DiscoveryRecord>,
        cap: usize,
        accept: &F,
    ) -> Result<usize>
    where
        F: Fn(&DiscoveryRecord) -> bool,
    {
        let deadline = Instant::now() + self.config.timeout;
        let mut seen = BTreeSet::new();
        let mut buf = [0u8; BUFFER_SIZE];

        while seen.len() < cap {
            let (len, from) = match timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Err(_) => return Ok(seen.len()),
                Ok(received) => received?,
            };

            let record = match parse_discovery_reply(&buf[..len]) {
                Ok(record) => record,
                Err(e) => {
                    tracing::debug!("Skipping reply from {}: {}", from, e);
                    continue;
                }
            };

            if !accept(&record) {
                continue;
            }

            seen.insert(record.address);
            if !found.contains_key(&record.address) {
                tracing::info!(
                    "Found {} at {} ({})",
                    record.model,
                    record.address,
                    record.reported_status
                );
                found.insert(record.address, record);
            }
        }

        tracing::debug!(
            "Reached {} distinct replies, ending discovery attempt early",
            cap
        );
        Ok(seen.len())
    }
}
