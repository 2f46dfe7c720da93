//! WebSocket transport layer.
//!
//! This module handles communication between the client (Rust) and a
//! Home Assistant instance via WebSocket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Client (Rust)  │                              │  Home Assistant │
//! │                 │         WebSocket            │                 │
//! │  Connection     │◄────────────────────────────►│  /api/websocket │
//! │  → event loop   │        ws:// or wss://       │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::open` - Dial the server and start the event loop
//! 2. The event loop completes the handshake in the background
//! 3. `Connection::send` - Issue commands once `Listening`
//! 4. `Connection::shutdown` - Close the socket and cancel pending commands
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{ClosedCallback, Connection};
