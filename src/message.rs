//! Classified inbound units produced by the wire parser.
//!
//! The parser collaborator turns socket bytes into exactly one of three
//! shapes: a connection-established notice, a response correlated to a sent
//! action, or an unsolicited event. The core only consumes this
//! classification and the response's identifier field; the byte-level
//! grammar lives outside this crate.

use serde::{Deserialize, Serialize};

use crate::action::ActionId;

/// One classified unit read from a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// The connection finished its handshake and is ready for traffic.
    /// Delivered once per connection.
    Connected,
    /// A server reply carrying the identifier of the action it answers.
    Response(Response),
    /// An unsolicited server-pushed message, uncorrelated to any action.
    Event(Event),
}

/// A server reply to a previously sent action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Identifier of the action this response answers.
    pub action_id: ActionId,
    /// Ordered key/value payload fields.
    pub fields: Vec<(String, String)>,
}

impl Response {
    /// Create a response with the given correlating identifier and fields.
    pub fn new(action_id: ActionId, fields: Vec<(String, String)>) -> Self {
        Self { action_id, fields }
    }

    /// Look up a field by name. Field names are matched case-insensitively
    /// since servers are not consistent about header casing.
    pub fn get(&self, name: &str) -> Option<&str> {
        get_field(&self.fields, name)
    }

    /// Whether the payload carries `Response: Success`.
    pub fn is_success(&self) -> bool {
        self.get("Response")
            .is_some_and(|v| v.eq_ignore_ascii_case("Success"))
    }
}

/// An unsolicited server-pushed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name.
    pub name: String,
    /// Ordered key/value payload fields.
    pub fields: Vec<(String, String)>,
}

impl Event {
    /// Create an event with the given name and fields.
    pub fn new(name: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Look up a field by name (case-insensitive, as for [`Response::get`]).
    pub fn get(&self, name: &str) -> Option<&str> {
        get_field(&self.fields, name)
    }
}

impl From<Response> for Event {
    /// Demote a response to its event form. Used on the events connection,
    /// which carries only pushed traffic after login and never discrete
    /// correlated responses.
    fn from(response: Response) -> Self {
        let name = response
            .get("Event")
            .map(str::to_string)
            .unwrap_or_else(|| "Response".to_string());
        Self {
            name,
            fields: response.fields,
        }
    }
}

fn get_field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
