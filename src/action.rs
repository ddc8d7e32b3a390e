//! Actions: client-issued requests and their completion slots.
//!
//! An [`Action`] is a named command with an ordered parameter list and a
//! process-unique identifier. Once submitted it is shared between the caller
//! and the correlation table as an `Arc<Action>`; the response (or a failure)
//! is delivered through a single-assignment result slot that any number of
//! observers can wait on.
//!
//! The slot is built on `tokio::sync::watch`, which retains the last value:
//! an observer that subscribes after completion sees the result immediately
//! instead of missing a notification.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::ClientError;
use crate::message::Response;

/// Outcome delivered through an action's result slot.
pub type ActionResult = Result<Response, ClientError>;

/// Completion callback invoked exactly once when the action resolves.
type Callback = Box<dyn Fn(&ActionResult) + Send + Sync>;

/// Process-unique action identifier used to correlate responses.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ActionId(pub String);

impl ActionId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ActionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ActionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ActionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lifecycle of an action from construction to resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Constructed, not yet submitted.
    New,
    /// Registered and waiting in the send queue.
    Queued,
    /// Written to the actions connection, awaiting its response.
    Sent,
    /// Response received; the result slot holds `Ok`.
    Completed,
    /// Resolved with an error; the result slot holds `Err`.
    Failed,
}

/// A client-issued request with a completion slot.
///
/// Construct with [`Action::new`] and the fluent `param`/`on_complete`
/// setters, then submit through `Client::send_action`:
///
/// ```ignore
/// let action = Action::new("Originate")
///     .param("Channel", "SIP/101")
///     .param("Context", "default");
/// let handle = client.send_action(action)?;
/// let result = handle.wait().await;
/// ```
pub struct Action {
    id: ActionId,
    name: String,
    params: Vec<(String, String)>,
    state: RwLock<ActionState>,
    slot: watch::Sender<Option<ActionResult>>,
    callback: Option<Callback>,
}

impl Action {
    /// Create a new action with a generated identifier and no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            id: ActionId::generate(),
            name: name.into(),
            params: Vec::new(),
            state: RwLock::new(ActionState::New),
            slot,
            callback: None,
        }
    }

    /// Append a parameter. Parameter order is preserved on the wire.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Attach a completion callback, invoked exactly once when the action
    /// resolves (with the response or with a failure).
    #[must_use]
    pub fn on_complete(mut self, callback: impl Fn(&ActionResult) + Send + Sync + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// The correlating identifier carried by this action's response.
    pub fn id(&self) -> &ActionId {
        &self.id
    }

    /// The command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ordered parameter list.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ActionState {
        *self.state.read().expect("action state lock poisoned")
    }

    pub(crate) fn set_state(&self, state: ActionState) {
        *self.state.write().expect("action state lock poisoned") = state;
    }

    /// Transition to `Sent` unless the action already resolved. The wire
    /// write and the response race: a response processed between the write
    /// returning and this call must not be stomped back to `Sent`.
    pub(crate) fn mark_sent(&self) {
        let mut state = self.state.write().expect("action state lock poisoned");
        if matches!(*state, ActionState::New | ActionState::Queued) {
            *state = ActionState::Sent;
        }
    }

    /// Write the result slot, transition the lifecycle state, and fire the
    /// callback. The slot is single-assignment: only the first call wins and
    /// returns `true`; later calls leave the slot untouched and return
    /// `false`, so concurrent dispatcher workers cannot double-complete.
    pub(crate) fn complete(&self, result: ActionResult) -> bool {
        let snapshot = result.clone();
        let next_state = match &snapshot {
            Ok(_) => ActionState::Completed,
            Err(_) => ActionState::Failed,
        };
        let mut incoming = Some(result);
        let wrote = self.slot.send_if_modified(|slot| {
            if slot.is_none() {
                // State flips before the slot write becomes visible, so a
                // waiter released by the notification never observes a
                // resolved slot with a stale lifecycle state.
                self.set_state(next_state);
                *slot = incoming.take();
                true
            } else {
                false
            }
        });

        if wrote {
            if let Some(callback) = &self.callback {
                callback(&snapshot);
            }
        }
        wrote
    }

    /// Suspend until the result slot is written, then return its contents.
    ///
    /// Any number of observers may wait; all of them are released by the
    /// single completion. Observers arriving after completion return
    /// immediately.
    pub async fn wait(&self) -> ActionResult {
        let mut rx = self.slot.subscribe();
        let result = match rx.wait_for(|slot| slot.is_some()).await {
            Ok(slot) => slot.clone().unwrap_or(Err(ClientError::Closed)),
            Err(_) => Err(ClientError::Closed),
        };
        result
    }

    /// Non-blocking read of the result slot; `None` while unresolved.
    pub fn result(&self) -> Option<ActionResult> {
        self.slot.borrow().clone()
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("params", &self.params)
            .field("state", &self.state())
            .field("resolved", &self.slot.borrow().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn success_response(id: &ActionId) -> Response {
        Response::new(
            id.clone(),
            vec![("Response".to_string(), "Success".to_string())],
        )
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = Action::new("Ping");
        let b = Action::new("Ping");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_param_order_preserved() {
        let action = Action::new("Login")
            .param("Username", "admin")
            .param("Secret", "secret")
            .param("Events", "Off");
        let keys: Vec<&str> = action.params().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["Username", "Secret", "Events"]);
    }

    #[test]
    fn test_new_action_is_unresolved() {
        let action = Action::new("Ping");
        assert_eq!(action.state(), ActionState::New);
        assert!(action.result().is_none());
    }

    #[test]
    fn test_complete_writes_slot_once() {
        let action = Action::new("Ping");
        let response = success_response(action.id());

        assert!(action.complete(Ok(response.clone())));
        assert_eq!(action.state(), ActionState::Completed);

        // Second completion loses and leaves the slot untouched.
        assert!(!action.complete(Err(ClientError::Closed)));
        assert_eq!(action.result(), Some(Ok(response)));
        assert_eq!(action.state(), ActionState::Completed);
    }

    #[test]
    fn test_mark_sent_does_not_stomp_a_resolution() {
        let action = Action::new("Ping");
        action.set_state(ActionState::Queued);
        action.complete(Ok(success_response(action.id())));

        // The write raced the response and lost; the resolved state wins.
        action.mark_sent();
        assert_eq!(action.state(), ActionState::Completed);

        let queued = Action::new("Ping");
        queued.set_state(ActionState::Queued);
        queued.mark_sent();
        assert_eq!(queued.state(), ActionState::Sent);
    }

    #[test]
    fn test_failure_outcome_sets_failed_state() {
        let action = Action::new("Ping");
        assert!(action.complete(Err(ClientError::Transport("gone".to_string()))));
        assert_eq!(action.state(), ActionState::Failed);
        assert!(matches!(action.result(), Some(Err(ClientError::Transport(_)))));
    }

    #[test]
    fn test_callback_fires_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let action = Action::new("Ping").on_complete(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let response = success_response(action.id());
        action.complete(Ok(response));
        action.complete(Err(ClientError::Closed));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_unblocks_on_completion() {
        let action = Arc::new(Action::new("Ping"));
        let waiter = Arc::clone(&action);
        let handle = tokio::spawn(async move { waiter.wait().await });

        tokio::task::yield_now().await;
        let response = success_response(action.id());
        action.complete(Ok(response.clone()));

        let result = handle.await.expect("waiter panicked");
        assert_eq!(result, Ok(response));
    }

    #[tokio::test]
    async fn test_wait_after_completion_returns_immediately() {
        let action = Action::new("Ping");
        let response = success_response(action.id());
        action.complete(Ok(response.clone()));
        assert_eq!(action.wait().await, Ok(response));
    }

    #[tokio::test]
    async fn test_concurrent_completion_single_winner() {
        let action = Arc::new(Action::new("Ping"));
        let response = success_response(action.id());

        let mut handles = Vec::new();
        for i in 0..8 {
            let action = Arc::clone(&action);
            let outcome: ActionResult = if i % 2 == 0 {
                Ok(response.clone())
            } else {
                Err(ClientError::Transport(format!("worker {i}")))
            };
            handles.push(tokio::spawn(async move { action.complete(outcome) }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.expect("completer panicked") {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(action.result().is_some());
    }
}
