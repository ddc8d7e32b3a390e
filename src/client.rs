//! Client composition: queues, dispatchers, gate, and login sequencing.
//!
//! # Architecture
//!
//! ```text
//! caller ──send_action──> CorrelationTable (pending)
//!                              │
//!                              v
//!                        action queue (1 worker, FIFO)
//!                              │ gate.wait()
//!                              │ promote -> sent
//!                              v
//!                       actions connection ──send_action──> server
//!
//! actions connection ──handle_message──> message queue (2 workers)
//!     Connected  -> open gate, enqueue Login (Events: Off)
//!     Response   -> resolve(id) -> complete action slot
//!
//! events connection ──handle_event──> event queue (2 workers)
//!     Connected  -> write Login (Events: On) directly, no table entry
//!     otherwise  -> forward to the embedding application
//! ```
//!
//! Ordering: the single-worker action queue guarantees wire order equals
//! submission order. Receives are deliberately parallel (two workers per
//! dispatcher), so no ordering is guaranteed between the completions of
//! different actions.

use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};

use tokio::sync::mpsc;

use crate::action::{Action, ActionState};
use crate::config::Config;
use crate::connection::Connection;
use crate::correlation::CorrelationTable;
use crate::error::ClientError;
use crate::gate::ReadyGate;
use crate::message::{Event, InboundMessage};
use crate::queue::WorkQueue;

/// Worker count for the action send queue. Exactly one: the server
/// processes some commands order-sensitively (login must be the first
/// action on the connection), so writes must never be reordered or
/// parallelized.
const SEND_WORKERS: usize = 1;

/// Worker count for the actions-connection dispatcher. Responses for
/// different actions may be processed in parallel.
const MESSAGE_WORKERS: usize = 2;

/// Worker count for the events-connection dispatcher.
const EVENT_WORKERS: usize = 2;

/// Client lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Constructed; connections not yet streaming.
    Stopped,
    /// Connections installed and streaming.
    Started,
    /// Reserved for full operational readiness (post-login
    /// acknowledgment); the current connection sequence never enters it.
    Ready,
}

type ConnectionSlot = Arc<StdRwLock<Option<Arc<dyn Connection>>>>;

/// Receiver half for unsolicited events, extracted once via
/// [`Client::take_events`] and typically moved into its own task.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventReceiver {
    /// Receive the next event. Returns `None` once the client is dropped.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Non-blocking receive. Returns `None` if no event is waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

/// Manager-protocol client core.
///
/// Composes the correlation table, the ordered send queue, the two
/// dispatcher pools, and the readiness gate. One client per configured
/// server target; torn down with [`Client::stop`].
pub struct Client {
    config: Config,
    state: StdRwLock<ClientState>,
    gate: Arc<ReadyGate>,
    table: Arc<CorrelationTable>,
    actions_connection: ConnectionSlot,
    events_connection: ConnectionSlot,
    action_queue: WorkQueue<Arc<Action>>,
    message_queue: WorkQueue<InboundMessage>,
    event_queue: WorkQueue<InboundMessage>,
    events_rx: StdMutex<Option<mpsc::UnboundedReceiver<Event>>>,
}

impl Client {
    /// Create a client for the given target. Worker tasks are spawned
    /// immediately (this must be called within a tokio runtime) but stay
    /// idle until [`Client::start`] installs the connections and the
    /// actions connection reports established.
    pub fn new(config: Config) -> Self {
        let gate = Arc::new(ReadyGate::new());
        let table = Arc::new(CorrelationTable::new());
        let actions_connection: ConnectionSlot = Arc::new(StdRwLock::new(None));
        let events_connection: ConnectionSlot = Arc::new(StdRwLock::new(None));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let action_queue = Self::spawn_action_queue(&gate, &table, &actions_connection);
        let message_queue =
            Self::spawn_message_queue(&gate, &table, &config, action_queue.sender());
        let event_queue = Self::spawn_event_queue(&config, &events_connection, events_tx);

        Self {
            config,
            state: StdRwLock::new(ClientState::Stopped),
            gate,
            table,
            actions_connection,
            events_connection,
            action_queue,
            message_queue,
            event_queue,
            events_rx: StdMutex::new(Some(events_rx)),
        }
    }

    /// Install the two connection handles and mark the client started.
    ///
    /// Establishing the connections (dial, TLS, reconnect) is the
    /// transport collaborator's job; it must begin delivering classified
    /// units through [`Client::handle_message`] and
    /// [`Client::handle_event`] only after this returns.
    pub fn start(&self, actions: Arc<dyn Connection>, events: Arc<dyn Connection>) {
        *self
            .actions_connection
            .write()
            .expect("connection slot poisoned") = Some(actions);
        *self
            .events_connection
            .write()
            .expect("connection slot poisoned") = Some(events);
        *self.state.write().expect("state lock poisoned") = ClientState::Started;
        log::info!(
            "client started for {}:{}",
            self.config.server,
            self.config.port
        );
    }

    /// Tear the client down: stop the worker pools and fail every live
    /// action with [`ClientError::Closed`] so no waiter is left suspended.
    pub fn stop(&self) {
        self.action_queue.shutdown();
        self.message_queue.shutdown();
        self.event_queue.shutdown();
        for action in self.table.drain() {
            action.complete(Err(ClientError::Closed));
        }
        *self.state.write().expect("state lock poisoned") = ClientState::Stopped;
        log::info!("client stopped");
    }

    /// Register an action and enqueue it for ordered sending. Returns the
    /// shared handle immediately; the result resolves asynchronously
    /// through the handle's slot.
    ///
    /// Submissions are accepted before [`Client::start`]: they queue up
    /// behind the readiness gate and go out, in order, once the actions
    /// connection reports established.
    ///
    /// # Errors
    ///
    /// `ClientError::DuplicateActionId` if the identifier is already live
    /// (an invariant violation), `ClientError::Closed` after
    /// [`Client::stop`].
    pub fn send_action(&self, action: Action) -> Result<Arc<Action>, ClientError> {
        let action = Arc::new(action);
        self.table.register(&action)?;
        action.set_state(ActionState::Queued);
        if let Err(e) = self.action_queue.push(Arc::clone(&action)) {
            self.table.remove_pending(action.id());
            return Err(e);
        }
        log::debug!("queued action {} ({})", action.name(), action.id());
        Ok(action)
    }

    /// Feed one classified unit from the actions connection. Called by the
    /// transport collaborator; returns immediately after enqueueing.
    ///
    /// # Errors
    ///
    /// `ClientError::Closed` after [`Client::stop`].
    pub fn handle_message(&self, message: InboundMessage) -> Result<(), ClientError> {
        self.message_queue.push(message)
    }

    /// Feed one classified unit from the events connection.
    ///
    /// # Errors
    ///
    /// `ClientError::Closed` after [`Client::stop`].
    pub fn handle_event(&self, message: InboundMessage) -> Result<(), ClientError> {
        self.event_queue.push(message)
    }

    /// Take the unsolicited-event receiver. Returns `None` if it was
    /// already taken.
    pub fn take_events(&self) -> Option<EventReceiver> {
        self.events_rx
            .lock()
            .expect("events receiver lock poisoned")
            .take()
            .map(|rx| EventReceiver { rx })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        *self.state.read().expect("state lock poisoned")
    }

    /// Whether the client is stopped.
    pub fn is_stopped(&self) -> bool {
        self.state() == ClientState::Stopped
    }

    /// Whether the client is started.
    pub fn is_started(&self) -> bool {
        self.state() == ClientState::Started
    }

    /// Whether the client is fully ready. The current connection sequence
    /// never enters [`ClientState::Ready`], so this reports `false`.
    pub fn is_ready(&self) -> bool {
        self.state() == ClientState::Ready
    }

    /// The single-worker send loop: wait for the gate, move the action to
    /// the `sent` partition, then write it. Promotion happens before the
    /// write so a response racing the write always finds its entry.
    fn spawn_action_queue(
        gate: &Arc<ReadyGate>,
        table: &Arc<CorrelationTable>,
        connection: &ConnectionSlot,
    ) -> WorkQueue<Arc<Action>> {
        let gate = Arc::clone(gate);
        let table = Arc::clone(table);
        let connection = Arc::clone(connection);
        WorkQueue::new("actions", SEND_WORKERS, move |action: Arc<Action>| {
            let gate = Arc::clone(&gate);
            let table = Arc::clone(&table);
            let connection = Arc::clone(&connection);
            async move {
                gate.wait().await;
                table.promote(&action);

                // The gate only opens once the actions connection reported
                // established, which start() precedes, so the slot is
                // populated here; an empty slot means the transport broke
                // its contract and the action fails accordingly.
                let conn = connection
                    .read()
                    .expect("connection slot poisoned")
                    .clone();
                let outcome = match conn {
                    Some(conn) => conn.send_action(&action).await,
                    None => Err(ClientError::Transport(
                        "actions connection not installed".to_string(),
                    )),
                };

                match outcome {
                    Ok(()) => {
                        action.mark_sent();
                        log::debug!("sent action {} ({})", action.name(), action.id());
                    }
                    Err(e) => {
                        // The action will never get a response; take it
                        // back out of the table and fail its slot rather
                        // than leaving it in flight forever.
                        table.resolve(action.id());
                        log::warn!(
                            "failed to write action {} ({}): {e}",
                            action.name(),
                            action.id()
                        );
                        action.complete(Err(e));
                    }
                }
                Ok(())
            }
        })
    }

    /// The actions-connection dispatcher: opens the gate and queues the
    /// login on connect, correlates responses otherwise.
    fn spawn_message_queue(
        gate: &Arc<ReadyGate>,
        table: &Arc<CorrelationTable>,
        config: &Config,
        action_tx: mpsc::UnboundedSender<Arc<Action>>,
    ) -> WorkQueue<InboundMessage> {
        let gate = Arc::clone(gate);
        let table = Arc::clone(table);
        let config = config.clone();
        WorkQueue::new("messages", MESSAGE_WORKERS, move |message: InboundMessage| {
            let gate = Arc::clone(&gate);
            let table = Arc::clone(&table);
            let config = config.clone();
            let action_tx = action_tx.clone();
            async move {
                match message {
                    InboundMessage::Connected => {
                        if gate.open() {
                            log::info!("actions connection established, action writes enabled");
                        }
                        // The login skips registration and enters the table
                        // straight through promote(); its response still
                        // correlates like any other.
                        let login = login_action(&config, "Off");
                        action_tx
                            .send(Arc::new(login))
                            .map_err(|_| ClientError::Closed)?;
                        Ok(())
                    }
                    InboundMessage::Response(response) => match table.resolve(&response.action_id)
                    {
                        Some(action) => {
                            log::debug!(
                                "response for action {} ({})",
                                action.name(),
                                action.id()
                            );
                            action.complete(Ok(response));
                            Ok(())
                        }
                        None => Err(ClientError::UnknownActionId(response.action_id)),
                    },
                    InboundMessage::Event(event) => {
                        // The actions connection logs in with Events: Off;
                        // anything pushed here anyway is not ours to route.
                        log::debug!("ignoring event {} on the actions connection", event.name);
                        Ok(())
                    }
                }
            }
        })
    }

    /// The events-connection dispatcher: logs in directly on connect,
    /// bypassing queue and table since that login never gets a discrete
    /// response, and forwards everything else to the embedding application.
    fn spawn_event_queue(
        config: &Config,
        connection: &ConnectionSlot,
        events_tx: mpsc::UnboundedSender<Event>,
    ) -> WorkQueue<InboundMessage> {
        let config = config.clone();
        let connection = Arc::clone(connection);
        WorkQueue::new("events", EVENT_WORKERS, move |message: InboundMessage| {
            let config = config.clone();
            let connection = Arc::clone(&connection);
            let events_tx = events_tx.clone();
            async move {
                match message {
                    InboundMessage::Connected => {
                        let conn = connection
                            .read()
                            .expect("connection slot poisoned")
                            .clone()
                            .ok_or_else(|| {
                                ClientError::Transport(
                                    "events connection not installed".to_string(),
                                )
                            })?;
                        let login = login_action(&config, "On");
                        conn.send_action(&login).await?;
                        log::info!("events connection established, login sent");
                        Ok(())
                    }
                    InboundMessage::Event(event) => {
                        // Receiver may not have been taken (or was dropped);
                        // events are then discarded, which is the embedding
                        // application's choice.
                        let _ = events_tx.send(event);
                        Ok(())
                    }
                    InboundMessage::Response(response) => {
                        let _ = events_tx.send(Event::from(response));
                        Ok(())
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server", &self.config.server)
            .field("port", &self.config.port)
            .field("state", &self.state())
            .field("gate_open", &self.gate.is_open())
            .field("pending", &self.table.pending_len())
            .field("sent", &self.table.sent_len())
            .finish_non_exhaustive()
    }
}

/// Build the login action sent on each connection after it establishes.
/// The events flag distinguishes the actions connection ("Off") from the
/// events connection ("On").
fn login_action(config: &Config, events: &str) -> Action {
    Action::new("Login")
        .param("Username", config.username.clone())
        .param("Secret", config.secret.clone())
        .param("Events", events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Connection that accepts every write and remembers nothing.
    struct NullConnection;

    #[async_trait]
    impl Connection for NullConnection {
        async fn send_action(&self, _action: &Action) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn test_config() -> Config {
        Config::new("localhost", 5038, "admin", "secret")
    }

    #[test]
    fn test_login_action_shape() {
        let login = login_action(&test_config(), "Off");
        assert_eq!(login.name(), "Login");
        assert_eq!(
            login.params(),
            &[
                ("Username".to_string(), "admin".to_string()),
                ("Secret".to_string(), "secret".to_string()),
                ("Events".to_string(), "Off".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_lifecycle_queries() {
        let client = Client::new(test_config());
        assert!(client.is_stopped());
        assert!(!client.is_started());
        assert!(!client.is_ready());

        client.start(Arc::new(NullConnection), Arc::new(NullConnection));
        assert!(client.is_started());
        assert!(!client.is_stopped());
        // Ready is reserved; the connection sequence never enters it.
        assert!(!client.is_ready());

        client.stop();
        assert!(client.is_stopped());
    }

    #[tokio::test]
    async fn test_take_events_is_one_shot() {
        let client = Client::new(test_config());
        assert!(client.take_events().is_some());
        assert!(client.take_events().is_none());
    }

    #[tokio::test]
    async fn test_send_action_returns_queued_handle() {
        let client = Client::new(test_config());
        let handle = client
            .send_action(Action::new("Ping"))
            .expect("fresh action");
        assert_eq!(handle.state(), ActionState::Queued);
        assert!(handle.result().is_none());
    }
}
