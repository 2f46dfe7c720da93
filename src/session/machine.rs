//! Session state machine.
//!
//! Consumes inbound messages one at a time, in arrival order, and returns
//! the reply to write (if any). Listener callbacks and the ready callback
//! are spawned, never awaited, so message handling cannot be stalled by
//! user code.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;
use crate::protocol::{Auth, EventData, EventMessage, Message, ResultMessage, SubscribeEvents};
use crate::subscription::{EventRegistry, StateRegistry};

use super::{CorrelationTable, SessionState};

// ============================================================================
// Types
// ============================================================================

/// Callback invoked once when the session reaches `Listening`.
pub type ReadyCallback = Box<dyn FnOnce() + Send>;

// ============================================================================
// SessionMachine
// ============================================================================

/// Handshake and routing state machine for one session.
pub struct SessionMachine {
    state: SessionState,
    access_token: String,
    events: Arc<EventRegistry>,
    states: Arc<StateRegistry>,
    correlation: Arc<CorrelationTable>,
    on_ready: Option<ReadyCallback>,
}

impl SessionMachine {
    /// Creates a machine in the `Init` state.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        events: Arc<EventRegistry>,
        states: Arc<StateRegistry>,
        correlation: Arc<CorrelationTable>,
        on_ready: Option<ReadyCallback>,
    ) -> Self {
        Self {
            state: SessionState::Init,
            access_token: access_token.into(),
            events,
            states,
            correlation,
            on_ready,
        }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Moves to `Closed`. Later messages are ignored.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Handles one inbound message.
    ///
    /// Returns the message to send in reply, if any.
    ///
    /// # Errors
    ///
    /// - [`Error::AuthInvalid`] / [`Error::SubscribeFailed`] end the session
    ///   (the machine is `Closed` afterwards)
    /// - [`Error::UnexpectedMessage`] / [`Error::UnknownChannel`] are protocol
    ///   errors; the message is dropped and the session continues
    pub fn handle(&mut self, message: Message) -> Result<Option<Message>> {
        trace!(state = %self.state, message_type = message.message_type(), "Handling message");

        match self.state {
            SessionState::Init => Ok(self.on_init(message)),
            SessionState::AuthSent => self.on_auth_sent(message),
            SessionState::SubscribeSent => self.on_subscribe_sent(message),
            SessionState::Listening => self.on_listening(message).map(|()| None),
            SessionState::Closed => {
                debug!(message_type = message.message_type(), "Ignoring message after close");
                Ok(None)
            }
        }
    }

    fn on_init(&mut self, message: Message) -> Option<Message> {
        match message {
            Message::AuthRequired => {
                self.state = SessionState::AuthSent;
                debug!("Authentication requested, sending token");
                Some(Message::Auth(Auth {
                    access_token: self.access_token.clone(),
                }))
            }
            other => {
                debug!(message_type = other.message_type(), "Ignoring message before auth_required");
                None
            }
        }
    }

    fn on_auth_sent(&mut self, message: Message) -> Result<Option<Message>> {
        match message {
            Message::AuthInvalid(invalid) => {
                self.state = SessionState::Closed;
                Err(Error::auth_invalid(invalid.message))
            }
            Message::AuthOk => {
                self.state = SessionState::SubscribeSent;
                debug!("Authenticated, subscribing to all events");
                Ok(Some(Message::SubscribeEvents(SubscribeEvents {
                    id: Some(CommandId::SUBSCRIPTION),
                    event_type: None,
                })))
            }
            other => {
                debug!(message_type = other.message_type(), "Ignoring message while authenticating");
                Ok(None)
            }
        }
    }

    fn on_subscribe_sent(&mut self, message: Message) -> Result<Option<Message>> {
        match message {
            Message::Result(result) if result.id.is_subscription() => {
                if result.success {
                    self.state = SessionState::Listening;
                    info!("Session established");
                    if let Some(on_ready) = self.on_ready.take() {
                        tokio::task::spawn_blocking(on_ready);
                    }
                    return Ok(None);
                }

                self.state = SessionState::Closed;
                let message = result
                    .error
                    .map_or_else(|| "no error details supplied".to_string(), |e| e.to_string());
                Err(Error::subscribe_failed(message))
            }
            // Commands cannot be issued before Listening, so no other
            // identifier is expected here.
            Message::Result(_) => Err(Error::unexpected_message(self.state, "result")),
            other => {
                debug!(message_type = other.message_type(), "Ignoring message while subscribing");
                Ok(None)
            }
        }
    }

    fn on_listening(&mut self, message: Message) -> Result<()> {
        match message {
            Message::Event(event) => self.route_event(event),
            Message::Result(result) => {
                self.route_result(result);
                Ok(())
            }
            other => Err(Error::unexpected_message(self.state, other.message_type())),
        }
    }

    fn route_event(&self, message: EventMessage) -> Result<()> {
        if !message.id.is_subscription() {
            return Err(Error::unknown_channel(message.id));
        }

        let event = message.event;
        match event.data {
            EventData::StateChanged(data) => {
                let entity_id = data.entity_id.clone();
                self.states.dispatch(&entity_id, *data);
            }
            EventData::Other(_) => {
                let event_type = event.event_type.clone();
                self.events.dispatch(&event_type, event);
            }
        }
        Ok(())
    }

    fn route_result(&self, result: ResultMessage) {
        self.correlation.resolve(result);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::{mpsc, oneshot};
    use tokio::time::timeout;

    use super::*;
    use crate::protocol::{
        AuthInvalid, Event, GetStates, ResultError, StateChangedData, timestamp,
    };

    struct Harness {
        machine: SessionMachine,
        events: Arc<EventRegistry>,
        states: Arc<StateRegistry>,
        correlation: Arc<CorrelationTable>,
        ready_count: Arc<AtomicUsize>,
    }

    fn harness() -> Harness {
        let events = Arc::new(EventRegistry::new());
        let states = Arc::new(StateRegistry::new());
        let correlation = Arc::new(CorrelationTable::new());
        let ready_count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ready_count);
        let machine = SessionMachine::new(
            "secret",
            Arc::clone(&events),
            Arc::clone(&states),
            Arc::clone(&correlation),
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );

        Harness {
            machine,
            events,
            states,
            correlation,
            ready_count,
        }
    }

    fn listening() -> Harness {
        let mut h = harness();
        h.machine.handle(Message::AuthRequired).expect("auth_required");
        h.machine.handle(Message::AuthOk).expect("auth_ok");
        h.machine
            .handle(Message::Result(ResultMessage::success(CommandId::SUBSCRIPTION, None)))
            .expect("subscribe result");
        h
    }

    fn event(id: u64, event_type: &str, data: EventData) -> Message {
        Message::Event(EventMessage {
            id: CommandId::new(id),
            event: Event {
                event_type: event_type.into(),
                time_fired: timestamp::parse("2020-04-06T15:12:03.123456+00:00")
                    .expect("timestamp"),
                origin: "LOCAL".into(),
                data,
            },
        })
    }

    fn state_change(entity_id: &str) -> EventData {
        EventData::StateChanged(Box::new(StateChangedData {
            entity_id: entity_id.into(),
            old_state: None,
            new_state: None,
        }))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_handshake_reaches_listening_once() {
        let mut h = harness();

        let reply = h.machine.handle(Message::AuthRequired).expect("auth_required");
        assert_eq!(
            reply,
            Some(Message::Auth(Auth {
                access_token: "secret".into()
            }))
        );
        assert_eq!(h.machine.state(), SessionState::AuthSent);

        let reply = h.machine.handle(Message::AuthOk).expect("auth_ok");
        let Some(Message::SubscribeEvents(subscribe)) = reply else {
            panic!("expected subscribe_events, got {reply:?}");
        };
        assert_eq!(subscribe.id, Some(CommandId::SUBSCRIPTION));
        assert_eq!(subscribe.event_type, None);
        assert_eq!(h.machine.state(), SessionState::SubscribeSent);

        let reply = h
            .machine
            .handle(Message::Result(ResultMessage::success(CommandId::SUBSCRIPTION, None)))
            .expect("result");
        assert!(reply.is_none());
        assert_eq!(h.machine.state(), SessionState::Listening);

        // A repeated subscription result is just a stale result now.
        h.machine
            .handle(Message::Result(ResultMessage::success(CommandId::SUBSCRIPTION, None)))
            .expect("stale result");

        settle().await;
        assert_eq!(h.ready_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_init_ignores_other_messages() {
        let mut h = harness();
        assert_eq!(h.machine.handle(Message::AuthOk).expect("ignored"), None);
        assert_eq!(h.machine.state(), SessionState::Init);
    }

    #[tokio::test]
    async fn test_auth_invalid_closes_without_ready() {
        let mut h = harness();
        h.machine.handle(Message::AuthRequired).expect("auth_required");

        let err = h
            .machine
            .handle(Message::AuthInvalid(AuthInvalid {
                message: "Invalid password".into(),
            }))
            .expect_err("auth_invalid");

        assert!(err.is_fatal());
        assert!(matches!(err, Error::AuthInvalid { ref message } if message == "Invalid password"));
        assert_eq!(h.machine.state(), SessionState::Closed);

        assert_eq!(h.machine.handle(Message::AuthOk).expect("ignored"), None);
        settle().await;
        assert_eq!(h.ready_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_subscribe_failure_closes() {
        let mut h = harness();
        h.machine.handle(Message::AuthRequired).expect("auth_required");
        h.machine.handle(Message::AuthOk).expect("auth_ok");

        let err = h
            .machine
            .handle(Message::Result(ResultMessage::failure(
                CommandId::SUBSCRIPTION,
                ResultError::new(2, "bad"),
            )))
            .expect_err("subscribe failure");

        assert!(matches!(err, Error::SubscribeFailed { .. }));
        assert_eq!(h.machine.state(), SessionState::Closed);
        settle().await;
        assert_eq!(h.ready_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_foreign_result_while_subscribing_is_protocol_error() {
        let mut h = harness();
        h.machine.handle(Message::AuthRequired).expect("auth_required");
        h.machine.handle(Message::AuthOk).expect("auth_ok");

        let err = h
            .machine
            .handle(Message::Result(ResultMessage::success(CommandId::new(2), None)))
            .expect_err("foreign result");

        assert!(err.is_protocol_error());
        assert_eq!(h.machine.state(), SessionState::SubscribeSent);
    }

    #[tokio::test]
    async fn test_state_change_routes_to_state_registry() {
        let mut h = listening();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let state_tx = tx.clone();
        h.states.subscribe("light.kitchen", move |data: Arc<StateChangedData>| {
            let _ = state_tx.send(format!("state:{}", data.entity_id));
        });
        let event_tx = tx.clone();
        h.events.subscribe("state_changed", move |_| {
            let _ = event_tx.send("event:state_changed".to_string());
        });

        h.machine
            .handle(event(1, "state_changed", state_change("light.kitchen")))
            .expect("event");

        let received = timeout(Duration::from_secs(1), rx.recv()).await.expect("delivered");
        assert_eq!(received.as_deref(), Some("state:light.kitchen"));
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_other_event_routes_to_event_registry() {
        let mut h = listening();
        let (tx, mut rx) = mpsc::unbounded_channel();
        h.events.subscribe("call_service", move |event: Arc<Event>| {
            let _ = tx.send(event.event_type.clone());
        });

        h.machine
            .handle(event(1, "call_service", EventData::Other(Default::default())))
            .expect("event");
        h.machine
            .handle(event(1, "automation_triggered", EventData::Other(Default::default())))
            .expect("event");

        let received = timeout(Duration::from_secs(1), rx.recv()).await.expect("delivered");
        assert_eq!(received.as_deref(), Some("call_service"));
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_event_on_unknown_channel_reaches_no_registry() {
        let mut h = listening();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        h.events.subscribe("call_service", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&hits);
        h.states.subscribe("light.kitchen", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let err = h
            .machine
            .handle(event(7, "call_service", EventData::Other(Default::default())))
            .expect_err("unknown channel");
        assert!(matches!(err, Error::UnknownChannel { id } if id == CommandId::new(7)));

        let err = h
            .machine
            .handle(event(7, "state_changed", state_change("light.kitchen")))
            .expect_err("unknown channel");
        assert!(err.is_protocol_error());

        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(h.machine.state(), SessionState::Listening);
    }

    #[tokio::test]
    async fn test_result_resolves_pending_command() {
        let mut h = listening();
        let id = h.correlation.allocate();
        let (tx, rx) = oneshot::channel();
        h.correlation.register(id, tx);

        h.machine
            .handle(Message::Result(ResultMessage::success(id, None)))
            .expect("result");

        let result = rx.await.expect("resolved").expect("success");
        assert_eq!(result.id, id);
        assert!(h.correlation.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_result_is_dropped_silently() {
        let mut h = listening();
        let reply = h
            .machine
            .handle(Message::Result(ResultMessage::success(CommandId::new(40), None)))
            .expect("stale result");
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_unexpected_message_while_listening() {
        let mut h = listening();
        let err = h
            .machine
            .handle(Message::GetStates(GetStates::default()))
            .expect_err("unexpected");
        assert!(matches!(
            err,
            Error::UnexpectedMessage {
                state: SessionState::Listening,
                message_type: "get_states"
            }
        ));
    }
}
