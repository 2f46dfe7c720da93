//! WebSocket connection and event loop.
//!
//! This module owns the socket of one session. A single tokio task reads
//! frames in arrival order, feeds them to the [`SessionMachine`], and
//! writes commands queued by the client.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming frames (handshake, results, events)
//! - Outgoing commands from the client API
//! - Identifier allocation and result correlation
//! - Cancellation of outstanding commands on exit

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{Message, ResultMessage};
use crate::session::{CloseReason, CorrelationTable, SessionMachine, SessionState};

// ============================================================================
// Types
// ============================================================================

/// Callback invoked once when the session ends.
pub type ClosedCallback = Box<dyn FnOnce(CloseReason) + Send>;

type WsSink<S> = SplitSink<WebSocketStream<S>, WsMessage>;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Assign an identifier, send, and wait for the result.
    Send {
        message: Message,
        response_tx: oneshot::Sender<Result<ResultMessage>>,
    },
    /// Close the connection.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket connection to a Home Assistant instance.
///
/// Cheap to clone; every clone talks to the same event loop.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Outstanding commands (shared with the event loop).
    correlation: Arc<CorrelationTable>,
    /// Latest session state published by the event loop.
    state_rx: watch::Receiver<SessionState>,
    /// Set once before the loop publishes `Closed`.
    close_reason: Arc<Mutex<Option<CloseReason>>>,
}

impl Connection {
    /// Dials `url` and starts the session on the new socket.
    ///
    /// Returns once the WebSocket upgrade completes; the handshake runs
    /// in the background.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the dial or upgrade fails.
    pub async fn open(
        url: &str,
        machine: SessionMachine,
        correlation: Arc<CorrelationTable>,
        on_closed: ClosedCallback,
    ) -> Result<Self> {
        info!(url, "Connecting");

        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| Error::connection(format!("{url}: {e}")))?;

        debug!(url, "WebSocket connected");

        Ok(Self::start(ws_stream, machine, correlation, on_closed))
    }

    /// Starts the event loop on an established WebSocket stream.
    pub fn start<S>(
        ws_stream: WebSocketStream<S>,
        machine: SessionMachine,
        correlation: Arc<CorrelationTable>,
        on_closed: ClosedCallback,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(machine.state());
        let close_reason = Arc::new(Mutex::new(None));

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            machine,
            EventLoopShared {
                correlation: Arc::clone(&correlation),
                state_tx,
                close_reason: Arc::clone(&close_reason),
            },
            on_closed,
        ));

        Self {
            command_tx,
            correlation,
            state_rx,
            close_reason,
        }
    }

    /// Sends a command and waits for its result.
    ///
    /// The event loop assigns the identifier at transmission time, so
    /// identifiers reach the server in strictly increasing order. There is
    /// no timeout; the call returns when the result arrives or the session
    /// ends.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if `message` is not a command
    /// - [`Error::NotReady`] if the handshake has not completed
    /// - [`Error::WebSocket`] if the frame could not be written
    /// - [`Error::ConnectionClosed`] if the session ended first
    pub async fn send(&self, message: Message) -> Result<ResultMessage> {
        if !message.is_command() {
            return Err(Error::protocol(format!(
                "{} is not a command",
                message.message_type()
            )));
        }

        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send {
                message,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        match response_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    /// Waits until the session reaches `Listening`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the session ends first.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut state_rx = self.state_rx.clone();
        let state = *state_rx
            .wait_for(|state| state.is_listening() || state.is_closed())
            .await
            .map_err(|_| Error::ConnectionClosed)?;

        if state.is_listening() {
            Ok(())
        } else {
            Err(Error::session_closed(self.close_reason()))
        }
    }

    /// Returns the current session state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Returns why the session ended, or `RemoteClosed` if it is unknown.
    #[must_use]
    pub fn close_reason(&self) -> CloseReason {
        self.close_reason
            .lock()
            .clone()
            .unwrap_or(CloseReason::RemoteClosed)
    }

    /// Returns the number of outstanding commands.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.len()
    }

    /// Closes the connection.
    ///
    /// Outstanding commands fail with [`Error::ConnectionClosed`].
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// State the event loop shares with [`Connection`] handles.
struct EventLoopShared {
    correlation: Arc<CorrelationTable>,
    state_tx: watch::Sender<SessionState>,
    close_reason: Arc<Mutex<Option<CloseReason>>>,
}

impl EventLoopShared {
    fn publish(&self, state: SessionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }
}

impl Connection {
    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        mut machine: SessionMachine,
        shared: EventLoopShared,
        on_closed: ClosedCallback,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        let reason = loop {
            tokio::select! {
                // Incoming frames from the server
                frame = ws_read.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            let outcome = Self::handle_incoming_frame(
                                text.as_bytes(),
                                &mut machine,
                                &mut ws_write,
                                &shared.correlation,
                            ).await;

                            // Closed is published only once the reason is recorded
                            if let Some(reason) = outcome {
                                break reason;
                            }
                            shared.publish(machine.state());
                        }

                        Some(Ok(WsMessage::Binary(data))) => {
                            trace!(len = data.len(), "Ignored binary frame");
                        }

                        Some(Ok(WsMessage::Close(frame))) => {
                            debug!(?frame, "WebSocket closed by remote");
                            break CloseReason::RemoteClosed;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break CloseReason::Transport { message: e.to_string() };
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break CloseReason::RemoteClosed;
                        }

                        // Ping/Pong are answered by tungstenite
                        _ => {}
                    }
                }

                // Commands from the client API
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { message, response_tx }) => {
                            Self::handle_send_command(
                                message,
                                response_tx,
                                machine.state(),
                                &mut ws_write,
                                &shared.correlation,
                            ).await;
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break CloseReason::Requested;
                        }

                        None => {
                            debug!("Command channel closed");
                            let _ = ws_write.close().await;
                            break CloseReason::Requested;
                        }
                    }
                }
            }
        };

        machine.close();
        *shared.close_reason.lock() = Some(reason.clone());
        shared.publish(SessionState::Closed);

        // Fail all pending commands on shutdown
        shared.correlation.cancel_all();

        info!(%reason, "Session closed");
        on_closed(reason);
    }

    /// Decodes one text frame and runs it through the state machine.
    ///
    /// An undecodable `result` fails the command waiting for its id.
    /// Returns a close reason if the session must end.
    async fn handle_incoming_frame<S>(
        bytes: &[u8],
        machine: &mut SessionMachine,
        ws_write: &mut WsSink<S>,
        correlation: &CorrelationTable,
    ) -> Option<CloseReason>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let message = match Message::decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                match Message::result_id(bytes) {
                    Some(id) => {
                        warn!(%id, error = %e, "Undecodable result");
                        correlation.fail(id, e);
                    }
                    None => warn!(error = %e, "Dropping undecodable frame"),
                }
                return None;
            }
        };

        match machine.handle(message) {
            Ok(Some(reply)) => {
                if let Err(e) = Self::write_message(ws_write, &reply).await {
                    error!(error = %e, message_type = reply.message_type(), "Failed to send reply");
                    return Some(CloseReason::Transport {
                        message: e.to_string(),
                    });
                }
                None
            }
            Ok(None) => None,
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Session terminated");
                let _ = ws_write.close().await;
                Some(Self::close_reason_for(e))
            }
            Err(e) => {
                warn!(error = %e, "Protocol error");
                None
            }
        }
    }

    /// Handles a send command from the client API.
    ///
    /// The slot is recorded only after the frame was written, so a failed
    /// write never leaves an entry behind.
    async fn handle_send_command<S>(
        message: Message,
        response_tx: oneshot::Sender<Result<ResultMessage>>,
        state: SessionState,
        ws_write: &mut WsSink<S>,
        correlation: &CorrelationTable,
    ) where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if !state.is_listening() {
            let _ = response_tx.send(Err(Error::not_ready(state)));
            return;
        }

        let id = correlation.allocate();
        let message = message.with_id(id);

        if let Err(e) = Self::write_message(ws_write, &message).await {
            warn!(%id, error = %e, "Failed to send command");
            let _ = response_tx.send(Err(e));
            return;
        }

        correlation.register(id, response_tx);
        trace!(%id, message_type = message.message_type(), "Command sent");
    }

    /// Encodes and writes one message.
    async fn write_message<S>(ws_write: &mut WsSink<S>, message: &Message) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let json = message.encode()?;
        ws_write.send(WsMessage::Text(json.into())).await?;
        Ok(())
    }

    /// Maps a fatal session error to its close reason.
    fn close_reason_for(error: Error) -> CloseReason {
        match error {
            Error::AuthInvalid { message } => CloseReason::AuthInvalid { message },
            Error::SubscribeFailed { message } => CloseReason::SubscribeFailed { message },
            other => CloseReason::Transport {
                message: other.to_string(),
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::Role;

    use super::*;
    use crate::identifiers::CommandId;
    use crate::protocol::GetStates;
    use crate::subscription::{EventRegistry, StateRegistry};

    fn machine(correlation: &Arc<CorrelationTable>) -> SessionMachine {
        SessionMachine::new(
            "token",
            Arc::new(EventRegistry::new()),
            Arc::new(StateRegistry::new()),
            Arc::clone(correlation),
            None,
        )
    }

    async fn duplex_connection() -> (Connection, WebSocketStream<DuplexStream>) {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let client_ws = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let server_ws = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;

        let correlation = Arc::new(CorrelationTable::new());
        let machine = machine(&correlation);
        let connection = Connection::start(client_ws, machine, correlation, Box::new(|_| {}));
        (connection, server_ws)
    }

    #[tokio::test]
    async fn test_send_rejects_non_command() {
        let (connection, _server) = duplex_connection().await;

        let err = connection.send(Message::AuthOk).await.unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_send_before_listening_is_not_ready() {
        let (connection, _server) = duplex_connection().await;

        let err = connection
            .send(Message::GetStates(GetStates::default()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NotReady {
                state: SessionState::Init
            }
        ));
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_fails_wait_ready() {
        let (connection, _server) = duplex_connection().await;

        connection.shutdown();

        let err = connection.wait_ready().await.unwrap_err();
        assert!(matches!(
            err,
            Error::SessionClosed {
                reason: CloseReason::Requested
            }
        ));
        assert_eq!(connection.state(), SessionState::Closed);
        assert_eq!(connection.close_reason(), CloseReason::Requested);
    }

    #[test]
    fn test_close_reason_for_fatal_errors() {
        assert_eq!(
            Connection::close_reason_for(Error::auth_invalid("bad")),
            CloseReason::AuthInvalid {
                message: "bad".into()
            }
        );
        assert_eq!(
            Connection::close_reason_for(Error::subscribe_failed("nope")),
            CloseReason::SubscribeFailed {
                message: "nope".into()
            }
        );
        assert!(matches!(
            Connection::close_reason_for(Error::ConnectionClosed),
            CloseReason::Transport { .. }
        ));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_pending_entry() {
        // Reads stay open and silent; writes go to a pipe whose reader is gone
        let (read_io, _read_peer) = tokio::io::duplex(4096);
        let (write_io, write_peer) = tokio::io::duplex(4096);
        drop(write_peer);
        let stream = tokio::io::join(read_io, write_io);
        let ws = WebSocketStream::from_raw_socket(stream, Role::Client, None).await;

        let correlation = Arc::new(CorrelationTable::new());
        let mut machine = machine(&correlation);
        for message in [
            Message::AuthRequired,
            Message::AuthOk,
            Message::Result(ResultMessage::success(CommandId::SUBSCRIPTION, None)),
        ] {
            machine.handle(message).expect("handshake step");
        }
        assert!(machine.state().is_listening());

        let connection = Connection::start(ws, machine, correlation, Box::new(|_| {}));

        let err = connection
            .send(Message::GetStates(GetStates::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WebSocket(_)));
        assert!(err.is_connection_error());
        assert_eq!(connection.pending_count(), 0);
        assert!(connection.state().is_listening());
    }
}
