//! Rust library for discovering and monitoring Snapmaker 3D printers on the local network
//!
//! This library provides an async API for the LAN interface of Snapmaker
//! printers. It supports:
//!
//! - Discovery via UDP broadcast on port 20054
//! - Token authorization with approval on the printer's touchscreen
//! - Status polling over the local HTTP API into a typed [`DeviceSnapshot`]
//! - Single and dual extruder detection
//! - Metric tables for building sensor views on top of a snapshot
//!
//! # Quick Start
//!
//! ```no_run
//! use snapmaker_lan::{ClientConfig, DeviceClient, Discovery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Find printers on the network
//!     let printers = Discovery::new().discover().await;
//!
//!     if let Some(printer) = printers.first() {
//!         println!("Found {} at {}", printer.model, printer.address);
//!
//!         let mut client =
//!             DeviceClient::new(printer.address.to_string(), ClientConfig::default())?;
//!
//!         // Someone has to tap "Yes" on the touchscreen
//!         let token = client.authorize().await?;
//!         println!("Store this token for next time: {token}");
//!
//!         let snapshot = client.update().await;
//!         println!("{} at {:.1}%", snapshot.status, snapshot.progress_percent);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Reusing a Token
//!
//! Tokens survive restarts of both sides. Seed the client with one you
//! stored earlier and skip the touchscreen prompt:
//!
//! ```no_run
//! use snapmaker_lan::{ClientConfig, DeviceClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = DeviceClient::with_token(
//!         "192.168.1.50",
//!         Some("stored-token".to_string()),
//!         ClientConfig::default(),
//!     )?;
//!
//!     let snapshot = client.update().await;
//!     if client.token_invalid() {
//!         client.authorize().await?;
//!     }
//!     println!("{:?}", snapshot.last_error);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Discovery**: UDP broadcast probe and reply parsing
//! - **Client**: One printer's token and last known snapshot
//! - **Token**: Token state and the approval handshake
//! - **Connection**: Low-level HTTP transport with timeouts
//! - **Protocol**: Wire formats of the discovery reply and API payloads
//! - **Types**: Domain types and payload-to-snapshot conversion
//! - **Sensor**: Metric descriptor tables

mod client;
mod config;
mod connection;
mod discovery;
mod error;
mod printer_connection;
mod protocol;
pub mod sensor;
mod token;
mod types;

// Public exports
pub use client::{DeviceClient, NOT_AUTHORIZED};
pub use config::{AuthorizeConfig, ClientConfig, DiscoveryConfig, API_PORT, DISCOVER_PORT};
pub use discovery::Discovery;
pub use error::{Result, SnapmakerError};
pub use printer_connection::{ConnectReply, PrinterConnection};
pub use protocol::{
    filter_sensitive, parse_discovery_reply, StatusPayload, DISCOVER_MESSAGE, SENSITIVE_API_KEYS,
};
pub use token::{TokenManager, TokenState};
pub use types::{
    DeviceSnapshot, DiscoveryRecord, ModulePresence, NozzleReading, Position, PrinterStatus,
    ToolKind, ToolheadType, NO_FILE,
};
