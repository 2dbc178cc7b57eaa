//! Watch one Snapmaker printer from the terminal.
//!
//! ```text
//! cargo run --example monitor                 # discover, pick the first printer
//! cargo run --example monitor -- 192.168.1.50 # known address
//! cargo run --example monitor -- 192.168.1.50 <token>
//! ```
//!
//! Set `RUST_LOG=snapmaker_lan=debug` for protocol details.

use snapmaker_lan::sensor::{sensors_for, BINARY_SENSORS};
use snapmaker_lan::{ClientConfig, DeviceClient, Discovery};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let host = match args.next() {
        Some(host) => host,
        None => {
            println!("Discovering printers...");
            let printers = Discovery::new().discover().await;
            for printer in &printers {
                println!(
                    "  {} at {} ({})",
                    printer.model, printer.address, printer.reported_status
                );
            }
            match printers.first() {
                Some(printer) => printer.address.to_string(),
                None => {
                    println!("No printers found");
                    return Ok(());
                }
            }
        }
    };

    let mut client = DeviceClient::with_token(host, args.next(), ClientConfig::default())?;
    if let Some(record) = client.probe().await {
        println!("Connected to {} at {}", record.model, record.address);
    }

    if client.token().is_none() {
        println!("Confirm the connection on the printer's touchscreen...");
        let token = client.authorize().await?;
        println!("Authorized. Pass this token next time: {token}");
    }

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        ticker.tick().await;

        let snapshot = client.update().await;
        if client.token_invalid() {
            println!("Token rejected, confirm again on the touchscreen...");
            let token = client.authorize().await?;
            println!("Authorized. New token: {token}");
            continue;
        }

        println!("---");
        for sensor in sensors_for(&snapshot) {
            let unit = sensor.unit.unwrap_or("");
            println!("{:<28} {}{}", sensor.name, sensor.read(&snapshot), unit);
        }
        for sensor in BINARY_SENSORS {
            let state = if sensor.read(&snapshot) { "on" } else { "off" };
            println!("{:<28} {}", sensor.name, state);
        }
        if let Some(error) = &snapshot.last_error {
            println!("{:<28} {}", "Last Error", error);
        }
    }
}
