//! Transport seam.
//!
//! The core does not dial sockets or parse bytes; it only needs a handle it
//! can write structured actions through. The transport collaborator
//! implements [`Connection`] for each of the two long-lived connections and
//! pushes classified inbound units back through `Client::handle_message`
//! and `Client::handle_event`.

use async_trait::async_trait;

use crate::action::Action;
use crate::error::ClientError;

/// Write capability of one long-lived connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Write an action (name plus ordered parameters, terminated per the
    /// wire format) to this connection. Returns once the write is buffered
    /// or flushed; it never waits for a response.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if the write fails or the
    /// connection is gone.
    async fn send_action(&self, action: &Action) -> Result<(), ClientError>;
}
