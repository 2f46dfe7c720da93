//! Home Assistant WebSocket client.
//!
//! This library manages one authenticated session against the Home
//! Assistant WebSocket API: it performs the handshake, subscribes to every
//! event on a single reserved channel, correlates command results with
//! their callers, and fans pushed events out to registered listeners.
//!
//! # Architecture
//!
//! ```text
//!  frames ──► Connection (event loop) ──► Message::decode ──► SessionMachine
//!                                                               │      │
//!                                              result{id} ◄─────┘      └────► event{id=1}
//!                                                   │                          │
//!                                           CorrelationTable         EventRegistry / StateRegistry
//!                                                   │                          │
//!                                            waiting caller              spawned listeners
//! ```
//!
//! Key design principles:
//!
//! - One task per session reads frames in arrival order
//! - Listener callbacks are spawned and never block the event loop
//! - Command identifiers are assigned at transmission, strictly increasing
//! - Every waiting command is released when the session ends
//!
//! # Quick Start
//!
//! ```no_run
//! use hago::{Client, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder()
//!         .url("ws://localhost:8123/api/websocket")
//!         .token("long-lived-token")
//!         .build()?;
//!
//!     client.subscribe_to_event("call_service", |event| {
//!         println!("service called: {:?}", event.get("service"));
//!     });
//!
//!     client.connect(|| {}, |reason| eprintln!("closed: {reason}")).await?;
//!     client.wait_ready().await?;
//!
//!     client
//!         .call_service("light", "turn_on", serde_json::Map::new())
//!         .await?;
//!
//!     client.close();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`Client`] facade and [`ClientBuilder`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | WebSocket message types and codec |
//! | [`session`] | Handshake state machine and command correlation |
//! | [`subscription`] | Listener registries |
//! | [`transport`] | WebSocket connection and event loop |

// ============================================================================
// Modules
// ============================================================================

/// Client facade and configuration.
///
/// Use [`Client::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for commands and listeners.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// WebSocket protocol message types.
///
/// Tagged-union codec for every frame exchanged with the server.
pub mod protocol;

/// Session protocol engine.
pub mod session;

/// Listener registries for pushed events.
pub mod subscription;

/// WebSocket transport layer.
///
/// Dials the server and runs the per-session event loop.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Client, ClientBuilder, ClientConfig};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CommandId, ListenerHandle};

// Protocol types
pub use protocol::{Event, EventData, Message, ResultError, State, StateChangedData};

// Session types
pub use session::{CloseReason, SessionState};
