//! Client facade.
//!
//! [`Client`] is the public entry point. It owns the two listener
//! registries, which outlive individual connections, and at most one live
//! [`Connection`].
//!
//! # Example
//!
//! ```no_run
//! use hago::Client;
//!
//! # async fn example() -> hago::Result<()> {
//! let client = Client::builder()
//!     .url("ws://localhost:8123/api/websocket")
//!     .token("long-lived-token")
//!     .build()?;
//!
//! client.subscribe_to_state("light.kitchen", |change| {
//!     println!("{} changed", change.entity_id);
//! });
//!
//! client.connect(|| println!("ready"), |reason| println!("closed: {reason}")).await?;
//! client.wait_ready().await?;
//!
//! let states = client.fetch_states().await?;
//! println!("{} entities", states.len());
//!
//! client.close();
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Validated client configuration |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::ListenerHandle;
use crate::protocol::{CallService, Event, GetStates, Message, ResultPayload, State, StateChangedData};
use crate::session::{CloseReason, CorrelationTable, SessionMachine, SessionState};
use crate::subscription::{EventRegistry, StateRegistry};
use crate::transport::Connection;

// ============================================================================
// Submodules
// ============================================================================

/// Builder pattern for client configuration.
pub mod builder;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{ClientBuilder, ClientConfig};

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the client.
struct ClientInner {
    /// Validated connection settings.
    config: ClientConfig,
    /// Listeners keyed by event type.
    events: Arc<EventRegistry>,
    /// Listeners keyed by entity id.
    states: Arc<StateRegistry>,
    /// Current connection, if any.
    connection: Mutex<Option<Connection>>,
}

// ============================================================================
// Client
// ============================================================================

/// Home Assistant WebSocket client.
///
/// Cheap to clone; clones share registries and the connection.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("state", &self.session_state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Construction
// ============================================================================

impl Client {
    /// Creates a configuration builder for the client.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a disconnected client from validated settings.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                events: Arc::new(EventRegistry::new()),
                states: Arc::new(StateRegistry::new()),
                connection: Mutex::new(None),
            }),
        }
    }

    /// Returns the client configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

// ============================================================================
// Client - Lifecycle
// ============================================================================

impl Client {
    /// Connects and starts the handshake.
    ///
    /// Returns once the WebSocket is open; authentication and the global
    /// event subscription continue in the background. `on_ready` runs once
    /// the session is `Listening`; `on_closed` runs once when it ends. Use
    /// [`Client::wait_ready`] to await the handshake instead.
    ///
    /// A closed client may connect again; listeners stay registered.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyConnected`] if a session is still open
    /// - [`Error::Connection`] if the server cannot be reached
    pub async fn connect<R, C>(&self, on_ready: R, on_closed: C) -> Result<()>
    where
        R: FnOnce() + Send + 'static,
        C: FnOnce(CloseReason) + Send + 'static,
    {
        if self.live_connection().is_some() {
            return Err(Error::AlreadyConnected);
        }

        let correlation = Arc::new(CorrelationTable::new());
        let machine = SessionMachine::new(
            self.inner.config.access_token.clone(),
            Arc::clone(&self.inner.events),
            Arc::clone(&self.inner.states),
            Arc::clone(&correlation),
            Some(Box::new(on_ready)),
        );

        let connection = Connection::open(
            self.inner.config.url.as_str(),
            machine,
            correlation,
            Box::new(on_closed),
        )
        .await?;

        let mut slot = self.inner.connection.lock();
        if slot.as_ref().is_some_and(|c| !c.state().is_closed()) {
            // Lost a race with a concurrent connect
            connection.shutdown();
            return Err(Error::AlreadyConnected);
        }
        *slot = Some(connection);

        Ok(())
    }

    /// Waits until the session is `Listening`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if [`Client::connect`] was never called
    /// - [`Error::SessionClosed`] if the session ended before becoming ready
    pub async fn wait_ready(&self) -> Result<()> {
        self.connection()?.wait_ready().await
    }

    /// Closes the session.
    ///
    /// Outstanding commands fail with [`Error::ConnectionClosed`]. Does
    /// nothing if the client is not connected.
    pub fn close(&self) {
        if let Some(connection) = self.inner.connection.lock().as_ref() {
            debug!("Closing session");
            connection.shutdown();
        }
    }

    /// Returns the current session state (`Init` before the first connect).
    #[must_use]
    pub fn session_state(&self) -> SessionState {
        self.inner
            .connection
            .lock()
            .as_ref()
            .map_or(SessionState::Init, Connection::state)
    }

    /// Returns the number of commands awaiting a result.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner
            .connection
            .lock()
            .as_ref()
            .map_or(0, Connection::pending_count)
    }

    fn connection(&self) -> Result<Connection> {
        self.inner
            .connection
            .lock()
            .clone()
            .ok_or(Error::NotConnected)
    }

    fn live_connection(&self) -> Option<Connection> {
        self.inner
            .connection
            .lock()
            .as_ref()
            .filter(|c| !c.state().is_closed())
            .cloned()
    }
}

// ============================================================================
// Client - Subscriptions
// ============================================================================

impl Client {
    /// Registers a listener for events of `event_type`.
    ///
    /// `state_changed` events are delivered to state listeners instead; see
    /// [`Client::subscribe_to_state`]. The listener runs on the blocking
    /// pool and may block without stalling the session.
    pub fn subscribe_to_event<F>(&self, event_type: impl Into<String>, listener: F) -> ListenerHandle
    where
        F: Fn(Arc<Event>) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(event_type, listener)
    }

    /// Registers a listener for state changes of `entity_id`.
    ///
    /// The handle is appended to the state registry's own list for
    /// `entity_id`. Event listeners registered under the same string are a
    /// separate list and never see state changes. The listener runs on the
    /// blocking pool like event listeners do.
    pub fn subscribe_to_state<F>(&self, entity_id: impl Into<String>, listener: F) -> ListenerHandle
    where
        F: Fn(Arc<StateChangedData>) + Send + Sync + 'static,
    {
        self.inner.states.subscribe(entity_id, listener)
    }

    /// Removes an event listener. Returns `false` if the handle is unknown.
    pub fn unsubscribe_from_event(&self, handle: ListenerHandle) -> bool {
        self.inner.events.unsubscribe(handle)
    }

    /// Removes a state listener. Returns `false` if the handle is unknown.
    pub fn unsubscribe_from_state(&self, handle: ListenerHandle) -> bool {
        self.inner.states.unsubscribe(handle)
    }

    /// Returns the number of event listeners registered for `event_type`.
    #[must_use]
    pub fn event_listener_count(&self, event_type: &str) -> usize {
        self.inner.events.listener_count(event_type)
    }

    /// Returns the number of state listeners registered for `entity_id`.
    #[must_use]
    pub fn state_listener_count(&self, entity_id: &str) -> usize {
        self.inner.states.listener_count(entity_id)
    }
}

// ============================================================================
// Client - Commands
// ============================================================================

impl Client {
    /// Calls `domain.service` with `service_data`.
    ///
    /// # Errors
    ///
    /// - [`Error::Command`] if the server reports a failure
    /// - [`Error::NotReady`] if the session is not `Listening`
    /// - [`Error::NotConnected`] / [`Error::ConnectionClosed`] otherwise
    pub async fn call_service(
        &self,
        domain: impl Into<String>,
        service: impl Into<String>,
        service_data: Map<String, Value>,
    ) -> Result<()> {
        let command = CallService::new(domain, service, service_data);
        debug!(domain = %command.domain, service = %command.service, "Calling service");

        let result = self
            .connection()?
            .send(Message::CallService(command))
            .await?;
        result.into_result()?;

        Ok(())
    }

    /// Fetches the current state of every entity, keyed by entity id.
    ///
    /// If the server lists an entity twice the later record wins.
    ///
    /// # Errors
    ///
    /// - [`Error::Command`] if the server reports a failure
    /// - [`Error::Protocol`] if the result is not a list of states
    /// - [`Error::NotReady`] if the session is not `Listening`
    pub async fn fetch_states(&self) -> Result<FxHashMap<String, State>> {
        let result = self
            .connection()?
            .send(Message::GetStates(GetStates::default()))
            .await?;

        let states = match result.into_result()? {
            Some(ResultPayload::States(states)) => states,
            Some(ResultPayload::Map(_)) => {
                return Err(Error::protocol("get_states returned an object, expected a list"));
            }
            None => Vec::new(),
        };

        Ok(index_states(states))
    }
}

/// Indexes states by entity id; later duplicates overwrite earlier ones.
fn index_states(states: Vec<State>) -> FxHashMap<String, State> {
    let mut by_entity = FxHashMap::default();
    by_entity.reserve(states.len());
    for state in states {
        by_entity.insert(state.entity_id.clone(), state);
    }
    by_entity
}

// ============================================================================
// Tests
// ============================================================================
