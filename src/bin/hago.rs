//! Command-line follower for a Home Assistant instance.
//!
//! Connects, logs the selected events and state changes, and closes the
//! session on Ctrl+C.
//!
//! ```text
//! HAGO_TOKEN=... hago --url ws://localhost:8123/api/websocket \
//!     --entity light.kitchen --event call_service --fetch-states
//! ```

// ============================================================================
// Imports
// ============================================================================

use clap::Parser;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hago::{Client, CloseReason, Error, Result};

// ============================================================================
// Cli
// ============================================================================

/// Follow a Home Assistant instance over its WebSocket API.
#[derive(Debug, Parser)]
#[command(name = "hago", version, about)]
struct Cli {
    /// WebSocket endpoint, e.g. ws://localhost:8123/api/websocket
    #[arg(long, env = "HAGO_URL")]
    url: String,

    /// Long-lived access token
    #[arg(long, env = "HAGO_TOKEN", hide_env_values = true)]
    token: String,

    /// Log events of this type (repeatable)
    #[arg(long = "event", value_name = "TYPE")]
    events: Vec<String>,

    /// Log state changes of this entity (repeatable)
    #[arg(long = "entity", value_name = "ENTITY_ID")]
    entities: Vec<String>,

    /// Print every entity state once the session is ready
    #[arg(long)]
    fetch_states: bool,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long)]
    debug: bool,
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let default = if debug { "hago=debug" } else { "hago=info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .init();
}

/// Registers a logging listener for every requested key.
fn register_listeners(client: &Client, cli: &Cli) {
    for event_type in &cli.events {
        client.subscribe_to_event(event_type.clone(), |event| {
            info!(
                event_type = %event.event_type,
                origin = %event.origin,
                time_fired = %event.time_fired,
                data = ?event.data,
                "Event"
            );
        });
    }

    for entity_id in &cli.entities {
        client.subscribe_to_state(entity_id.clone(), |change| {
            let old = change.old_state.as_ref().map(|s| s.state.as_str());
            let new = change.new_state.as_ref().map(|s| s.state.as_str());
            info!(entity_id = %change.entity_id, ?old, ?new, "State changed");
        });
    }
}

/// Prints every entity state, sorted by entity id.
async fn print_states(client: &Client) -> Result<()> {
    let states = client.fetch_states().await?;

    let mut entities: Vec<_> = states.values().collect();
    entities.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

    for state in entities {
        println!("{}\t{}", state.entity_id, state.state);
    }
    info!(count = states.len(), "Fetched states");

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let client = Client::builder().url(&cli.url).token(&cli.token).build()?;
    register_listeners(&client, &cli);

    let (closed_tx, mut closed_rx) = oneshot::channel::<CloseReason>();
    client
        .connect(
            || info!("Session ready"),
            move |reason| {
                let _ = closed_tx.send(reason);
            },
        )
        .await?;
    client.wait_ready().await?;

    if cli.fetch_states {
        print_states(&client).await?;
    }

    info!("Press Ctrl+C to exit...");

    let reason = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            client.close();
            (&mut closed_rx).await.unwrap_or(CloseReason::Requested)
        }
        reason = &mut closed_rx => reason.unwrap_or(CloseReason::RemoteClosed),
    };

    match reason {
        CloseReason::Requested => Ok(()),
        reason => {
            warn!(%reason, "Session ended");
            Err(Error::session_closed(reason))
        }
    }
}
