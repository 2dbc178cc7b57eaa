// Integration tests for UDP discovery against a fake printer on loopback.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

use snapmaker_lan::{Discovery, DiscoveryConfig, DISCOVER_MESSAGE};

// ── Helpers ─────────────────────────────────────────────────────────

struct FakePrinter {
    port: u16,
    probes: Arc<AtomicUsize>,
}

/// Bind a fake printer on loopback. It ignores the first `silent_probes`
/// probes and answers every later one with `replies`, in order.
async fn fake_printer(replies: Vec<&'static str>, silent_probes: usize) -> FakePrinter {
    fake_network(move |probe| {
        if probe < silent_probes {
            Vec::new()
        } else {
            replies.clone()
        }
    })
    .await
}

/// Bind a fake network on loopback that answers the n-th probe (0-based)
/// with `replies_for(n)`.
async fn fake_network<F>(replies_for: F) -> FakePrinter
where
    F: Fn(usize) -> Vec<&'static str> + Send + 'static,
{
    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = socket.local_addr().unwrap().port();
    let probes = Arc::new(AtomicUsize::new(0));

    let counter = probes.clone();
    tokio::spawn(async move {
        let mut buf = [0u8; 64];
        loop {
            let Ok((len, from)) = socket.recv_from(&mut buf).await else {
                return;
            };
            if &buf[..len] != DISCOVER_MESSAGE {
                continue;
            }
            let probe = counter.fetch_add(1, Ordering::SeqCst);
            for reply in replies_for(probe) {
                socket.send_to(reply.as_bytes(), from).await.unwrap();
            }
        }
    });

    FakePrinter { port, probes }
}

fn discovery_for(fake: &FakePrinter, max_retries: u32) -> Discovery {
    Discovery::with_config(DiscoveryConfig {
        port: fake.port,
        broadcast_addr: Ipv4Addr::LOCALHOST,
        timeout: Duration::from_millis(300),
        max_retries,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(50),
        ..DiscoveryConfig::default()
    })
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_discover_parses_and_deduplicates() {
    let fake = fake_printer(
        vec![
            "hello",
            "\"IP@192.168.1.50|Model:A350T|Status:IDLE\"",
            "IP@192.168.1.51|Model:J1|Status:RUNNING",
            "IP@192.168.1.50|Model:A350T|Status:IDLE",
            "IP@not-an-ip|Model:A350T|Status:IDLE",
        ],
        0,
    )
    .await;

    let printers = discovery_for(&fake, 3).discover().await;

    assert_eq!(printers.len(), 2);
    assert_eq!(printers[0].address, Ipv4Addr::new(192, 168, 1, 50));
    assert_eq!(printers[0].model, "A350T");
    assert_eq!(printers[0].reported_status, "IDLE");
    assert_eq!(printers[1].model, "J1");

    // Every attempt is made; repeated answers collapse into one record each
    assert_eq!(fake.probes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_discover_keeps_probing_after_first_answer() {
    let fake = fake_network(|probe| {
        let mut replies = vec!["IP@192.168.1.50|Model:A350T|Status:IDLE"];
        if probe >= 1 {
            replies.push("IP@192.168.1.51|Model:J1|Status:RUNNING");
        }
        replies
    })
    .await;

    let printers = discovery_for(&fake, 5).discover().await;

    let addresses: Vec<Ipv4Addr> = printers.iter().map(|p| p.address).collect();
    assert_eq!(
        addresses,
        vec![Ipv4Addr::new(192, 168, 1, 50), Ipv4Addr::new(192, 168, 1, 51)]
    );
    assert_eq!(printers[1].reported_status, "RUNNING");
    assert_eq!(fake.probes.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_discover_picks_up_late_answers() {
    let fake = fake_printer(vec!["IP@10.0.0.7|Model:A250|Status:IDLE"], 2).await;

    let printers = discovery_for(&fake, 5).discover().await;

    assert_eq!(printers.len(), 1);
    assert_eq!(printers[0].address, Ipv4Addr::new(10, 0, 0, 7));
    assert_eq!(fake.probes.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_discover_with_no_responders() {
    let fake = fake_printer(vec![], 0).await;

    let printers = discovery_for(&fake, 2).discover().await;

    assert!(printers.is_empty());
    assert_eq!(fake.probes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_discover_only_malformed_replies() {
    let fake = fake_printer(vec!["IP@192.168.1.50|Model:A350T", "garbage"], 0).await;

    let printers = discovery_for(&fake, 1).discover().await;

    assert!(printers.is_empty());
}

#[tokio::test]
async fn test_response_cap_ends_attempt_early() {
    let fake = fake_printer(
        vec![
            "IP@192.168.1.50|Model:A350T|Status:IDLE",
            "IP@192.168.1.51|Model:J1|Status:IDLE",
        ],
        0,
    )
    .await;

    let discovery = Discovery::with_config(DiscoveryConfig {
        max_responses_per_retry: 1,
        ..discovery_for(&fake, 1).config().clone()
    });
    let printers = discovery.discover().await;

    assert_eq!(printers.len(), 1);
    assert_eq!(printers[0].address, Ipv4Addr::new(192, 168, 1, 50));
}

// ── Probe ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_probe_ignores_other_printers() {
    let fake = fake_printer(
        vec![
            "IP@192.168.1.51|Model:J1|Status:IDLE",
            "IP@192.168.1.50|Model:A350T|Status:RUNNING",
        ],
        0,
    )
    .await;

    let record = discovery_for(&fake, 1)
        .probe(Ipv4Addr::new(192, 168, 1, 50))
        .await
        .unwrap();

    assert_eq!(record.model, "A350T");
    assert_eq!(record.reported_status, "RUNNING");
}

#[tokio::test]
async fn test_probe_of_absent_printer() {
    let fake = fake_printer(vec!["IP@192.168.1.51|Model:J1|Status:IDLE"], 0).await;

    let record = discovery_for(&fake, 2)
        .probe(Ipv4Addr::new(192, 168, 1, 50))
        .await;

    assert!(record.is_none());
}
