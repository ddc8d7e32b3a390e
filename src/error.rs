//! Error taxonomy for the client core.
//!
//! Errors are deliberately small and cloneable: a failure outcome is stored
//! in an action's result slot, where any number of observers may read it.

use crate::action::ActionId;

/// Errors that can occur during client operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// An action with this identifier is already live in the correlation
    /// table. Identifiers are random UUIDs, so this indicates a bug in
    /// identifier generation rather than a recoverable user error.
    DuplicateActionId(ActionId),
    /// A response arrived carrying an identifier with no in-flight action.
    /// Either the server replied to something we never sent or the client
    /// lost track of an action; reported loudly, never swallowed.
    UnknownActionId(ActionId),
    /// Write or connection failure on one of the two connections.
    Transport(String),
    /// The client (or one of its internal queues) has been shut down.
    Closed,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateActionId(id) => write!(f, "Duplicate action id: {id}"),
            Self::UnknownActionId(id) => write!(f, "Unrecognized response action id: {id}"),
            Self::Transport(msg) => write!(f, "Transport error: {msg}"),
            Self::Closed => write!(f, "Client closed"),
        }
    }
}

impl std::error::Error for ClientError {}
