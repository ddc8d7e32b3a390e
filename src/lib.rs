//! Asynchronous Asterisk Manager Interface (AMI) client core.
//!
//! This crate implements the request/response correlation core of a manager
//! client speaking over two long-lived duplex connections: an "actions"
//! connection for submitted commands and their correlated responses, and an
//! "events" connection for unsolicited server pushes.
//!
//! # Architecture
//!
//! ```text
//! Client
//!     ├── CorrelationTable (pending / sent, one lock)
//!     ├── action queue      (1 worker  - ordered wire writes)
//!     ├── message dispatcher (2 workers - responses, login sequencing)
//!     ├── event dispatcher   (2 workers - pushed events, events login)
//!     └── ReadyGate          (one-shot latch, opened on connect)
//! ```
//!
//! The transport (TCP dial, TLS, reconnect) and the byte-level wire parser
//! are collaborators supplied by the embedding application: it implements
//! [`Connection`] for writes and feeds classified [`InboundMessage`] units
//! back through [`Client::handle_message`] and [`Client::handle_event`].
//!
//! # Usage
//!
//! ```ignore
//! let client = Client::new(Config::new("pbx.example.com", 5038, "admin", "secret"));
//! client.start(actions_connection, events_connection);
//!
//! let handle = client.send_action(Action::new("Ping"))?;
//! let response = handle.wait().await?;
//!
//! let mut events = client.take_events().expect("first take");
//! while let Some(event) = events.recv().await {
//!     // react to server pushes
//! }
//! ```

pub mod action;
pub mod client;
pub mod config;
pub mod connection;
pub mod correlation;
pub mod error;
pub mod gate;
pub mod message;

mod queue;

pub use action::{Action, ActionId, ActionResult, ActionState};
pub use client::{Client, ClientState, EventReceiver};
pub use config::Config;
pub use connection::Connection;
pub use correlation::CorrelationTable;
pub use error::ClientError;
pub use gate::ReadyGate;
pub use message::{Event, InboundMessage, Response};
