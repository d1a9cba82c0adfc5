//! Watch a DataLayer session and print what happens.
//!
//! Demonstrates:
//! - Building a client with custom options
//! - Subscribing to session events
//! - Sending commands through a handle
//! - Shutting down cleanly
//!
//! Usage:
//!   cargo run --example watch_session -- --simulate
//!   cargo run --example watch_session -- <session-id> [--host localhost:8000] [--secure] [--debug]

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::{Context, bail};
use datalayer_session::{
    ClientOptions, EventKind, MemoryTransport, SessionClient, SessionEvent, SessionHandle,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Args
// ============================================================================

#[derive(Debug, Clone)]
struct Args {
    session_id: Option<String>,
    host: Option<String>,
    secure: bool,
    simulate: bool,
    debug: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut parsed = Self {
            session_id: None,
            host: None,
            secure: false,
            simulate: false,
            debug: false,
        };

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--host" => parsed.host = iter.next(),
                "--secure" => parsed.secure = true,
                "--simulate" => parsed.simulate = true,
                "--debug" => parsed.debug = true,
                _ => parsed.session_id = Some(arg),
            }
        }

        parsed
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "datalayer_session=debug"
    } else {
        "datalayer_session=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    if args.simulate {
        simulate().await
    } else {
        watch(args).await
    }
}

/// Connects to a real server and prints events until Ctrl+C.
async fn watch(args: Args) -> anyhow::Result<()> {
    let Some(session_id) = args.session_id else {
        bail!("missing session id (or pass --simulate)");
    };

    let mut options = ClientOptions::new().with_page_secure(args.secure);
    if let Some(host) = args.host {
        options = options.with_host(host);
    }

    let client = SessionClient::builder()
        .session_id(session_id)
        .options(options)
        .build()
        .context("building client")?;

    println!("Connecting to {}", client.endpoint());
    let (handle, task) = client.spawn();
    print_events(&handle);

    println!("Press Ctrl+C to exit...");
    tokio::signal::ctrl_c().await.ok();

    handle.shutdown().await;
    task.await.context("client task")?;
    Ok(())
}

/// Plays a short scripted session over the in-memory transport.
async fn simulate() -> anyhow::Result<()> {
    let transport = MemoryTransport::new();
    let client = SessionClient::builder()
        .session_id("demo-session")
        .transport(transport.clone())
        .build()?;

    let (handle, task) = client.spawn();
    print_events(&handle);

    let link = loop {
        if let Some(link) = transport.last_link() {
            break link;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };
    link.open();
    tokio::time::sleep(Duration::from_millis(20)).await;

    handle.goto("shop.example.com").await?;
    handle.capture_datalayer().await?;

    for frame in [
        json!({"action": "url_changed", "url": "https://shop.example.com/"}),
        json!({"action": "screenshot", "image_url": "/media/screenshots/1.jpg"}),
        json!({"action": "datalayer", "event": "page_view", "data": {"event": "page_view"}, "valid": true}),
        json!({"action": "datalayer", "event": "add_to_cart", "data": {"event": "add_to_cart"}, "valid": false, "errors": ["'currency' is a required property"]}),
        json!({"action": "datalayer", "event": "scroll", "data": {"event": "scroll"}}),
        json!({"action": "report", "status": "generated", "report_url": "/reports/42/"}),
        json!({"action": "session", "status": "completed"}),
    ] {
        link.push_json(&frame);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!("\nFrames sent by the client:");
    for frame in link.sent() {
        println!("  {frame}");
    }

    let state = handle.state();
    println!(
        "\nFinal state: {} screenshots, {} events ({} valid / {} invalid), remote {}",
        state.screenshot_count,
        state.datalayer_count,
        state.valid_count,
        state.invalid_count,
        state.remote_session_status.label()
    );

    if handle.stop_session().await.is_ok() {
        bail!("commands should be refused after the session completed");
    }

    handle.shutdown().await;
    task.await?;
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn print_events(handle: &SessionHandle) {
    handle.subscribe(EventKind::Connection, |event| {
        if let SessionEvent::Connection { connected, code } = event {
            println!("[connection] connected={connected} code={code:?}");
        }
    });

    handle.subscribe(EventKind::DataLayer, |event| {
        if let SessionEvent::DataLayer(event) = event {
            println!(
                "[datalayer] {} {} {}",
                event.timestamp.format("%H:%M:%S"),
                event.event_name,
                event.validity.label()
            );
            for error in &event.errors {
                println!("            - {error}");
            }
        }
    });

    handle.subscribe(EventKind::Stats, |event| {
        if let SessionEvent::Stats(stats) = event {
            println!("[stats] {}", stats.message);
        }
    });

    handle.subscribe(EventKind::Screenshot, |event| {
        if let SessionEvent::Screenshot { image_url, count } = event {
            println!("[screenshot #{count}] {image_url}");
        }
    });

    handle.subscribe(EventKind::UrlChanged, |event| {
        if let SessionEvent::UrlChanged { url } = event {
            println!("[url] {url}");
        }
    });

    handle.subscribe(EventKind::Report, |event| {
        if let SessionEvent::Report { report_url, .. } = event {
            println!("[report] {}", report_url.as_deref().unwrap_or("-"));
        }
    });
}
