//! Link lifecycle against a local echo peer.
//!
//! Demonstrates:
//! - Starting a loopback echo server
//! - Building a TCP link and subscribing to its events
//! - Connect, write, receive, disconnect
//! - A failed connect reported as `CommunicationError`
//!
//! Usage:
//!   cargo run --example loopback
//!   cargo run --example loopback -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use anyhow::{Context, bail};
use groundlink::{EventKind, LinkEvent, LoopbackServer, TcpLink};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let debug = std::env::args().any(|a| a == "--debug");
    init_logging(debug);

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "groundlink=debug"
    } else {
        "groundlink=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

async fn run() -> anyhow::Result<()> {
    println!("=== Loopback Link ===\n");

    // ========================================================================
    // Echo Server
    // ========================================================================

    let server = LoopbackServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
    println!("[Server] Echoing on {}", server.local_addr());

    // ========================================================================
    // Connect
    // ========================================================================

    let link = TcpLink::builder()
        .host("127.0.0.1")
        .port(server.port())
        .connect_timeout(Duration::from_secs(2))
        .build()?;
    let mut events = link.subscribe();

    println!("[Link] Connecting to {}...", link.name());
    link.connect();
    events
        .wait_for(EventKind::Connected, CONNECT_TIMEOUT)
        .await
        .context("link did not connect")?;
    println!("        ✓ Connected ({})", link.state());

    // ========================================================================
    // Round Trip
    // ========================================================================

    let payload = b"groundlink says hello";
    link.write_bytes(payload);
    let written = link.wait_for_bytes_written(EVENT_TIMEOUT).await?;
    println!("[Link] Wrote {written} bytes");

    let mut received = Vec::new();
    while received.len() < payload.len() {
        match events.wait_for(EventKind::BytesReceived, EVENT_TIMEOUT).await? {
            LinkEvent::BytesReceived { data, .. } => received.extend(data),
            other => bail!("unexpected event: {other:?}"),
        }
    }
    println!("        ✓ Echoed: {}", String::from_utf8_lossy(&received));

    // ========================================================================
    // Disconnect
    // ========================================================================

    link.disconnect();
    events.wait_for(EventKind::Disconnected, EVENT_TIMEOUT).await?;
    println!("[Link] Disconnected ({})", link.state());

    // ========================================================================
    // Failed Connect
    // ========================================================================

    let port = server.port();
    server.quit();
    tokio::time::sleep(Duration::from_millis(50)).await;
    link.set_port(port);

    link.connect();
    if let LinkEvent::CommunicationError { link_name, message } = events
        .wait_for(EventKind::CommunicationError, CONNECT_TIMEOUT)
        .await?
    {
        println!("[Link] {link_name}: {message}");
    }

    println!("\n=== Done ===");
    Ok(())
}
