//! Seam between the connection core and a concrete chat protocol client.
//!
//! A transport owns one physical connection for one credential. It reports
//! lifecycle and message events to the [`TransportListener`] it was started
//! with and exposes the workspace directory for channel lookups.

use std::sync::Arc;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

use crate::{Credential, Result, directory::ChannelDirectory, handle::TransportListener};

/// Message subtype the platform uses for deletion notices.
pub const MESSAGE_DELETED_SUBTYPE: &str = "message_deleted";

/// An account or workspace identity reported at authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Payload of a successful authentication handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedInfo {
    /// The connected user/bot.
    #[serde(rename = "self")]
    pub self_identity: Identity,
    pub team: Identity,
}

/// A message event exactly as the transport delivered it.
///
/// Fields the core does not interpret are kept in `extra` so subscribers
/// see the payload as delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Channel id the message was posted in.
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawMessage {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            subtype: None,
            text: Some(text.into()),
            user: None,
            ts: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Deletion notices are never forwarded to inbound ports.
    pub fn is_deletion(&self) -> bool {
        self.subtype.as_deref() == Some(MESSAGE_DELETED_SUBTYPE)
    }
}

/// Lifecycle and message events a transport reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportEvent {
    Connecting,
    Authenticated(AuthenticatedInfo),
    ConnectionOpened,
    Disconnect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<i64>,
    },
    Message(RawMessage),
    /// Start/authentication failed. May be recoverable.
    UnableToStart { error: String },
}

/// One physical connection to the chat platform.
///
/// Implementations must not block: `start` and `send_message` hand work to
/// the background and report progress through the listener.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin connecting. May be called again after `UnableToStart`.
    fn start(&self, listener: TransportListener);

    /// Close the connection. Completion may lag behind the call that
    /// triggered it.
    async fn disconnect(&self) -> Result<()>;

    /// Fire-and-forget send. Failures surface only as transport events.
    fn send_message(&self, text: &str, channel_id: &str);

    /// Workspace directory used for channel lookups.
    fn directory(&self) -> &dyn ChannelDirectory;
}

/// Creates a transport for a credential the registry has not seen yet.
///
/// Called with the registry table locked; must not call back into the
/// registry.
pub trait TransportFactory: Send + Sync {
    fn create(&self, credential: &Credential) -> Arc<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn(&Credential) -> Arc<dyn Transport> + Send + Sync,
{
    fn create(&self, credential: &Credential) -> Arc<dyn Transport> {
        self(credential)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletion_subtype_detected() {
        let msg = RawMessage::new("C1", "gone").with_subtype(MESSAGE_DELETED_SUBTYPE);
        assert!(msg.is_deletion());
        assert!(!RawMessage::new("C1", "hi").is_deletion());
        assert!(
            !RawMessage::new("C1", "edit")
                .with_subtype("message_changed")
                .is_deletion()
        );
    }

    #[test]
    fn message_event_keeps_unknown_fields() {
        let json = r#"{
            "type": "message",
            "channel": "C024BE91L",
            "user": "U2147483697",
            "text": "Hello world",
            "ts": "1355517523.000005",
            "team": "T1",
            "edited": {"user": "U1"}
        }"#;
        let event: TransportEvent = serde_json::from_str(json).unwrap();
        let TransportEvent::Message(msg) = event else {
            panic!("expected message event");
        };
        assert_eq!(msg.channel, "C024BE91L");
        assert_eq!(msg.text.as_deref(), Some("Hello world"));
        assert_eq!(msg.extra.get("team"), Some(&Value::from("T1")));
        assert!(msg.extra.contains_key("edited"));
    }

    #[test]
    fn lifecycle_events_parse_from_tags() {
        let auth: TransportEvent = serde_json::from_str(
            r#"{"type":"authenticated","self":{"id":"U1","name":"relay"},"team":{"id":"T1","name":"acme"}}"#,
        )
        .unwrap();
        assert!(matches!(
            auth,
            TransportEvent::Authenticated(ref info) if info.self_identity.name == "relay"
        ));

        let dropped: TransportEvent =
            serde_json::from_str(r#"{"type":"disconnect","code":1006}"#).unwrap();
        assert_eq!(dropped, TransportEvent::Disconnect {
            error: None,
            code: Some(1006)
        });

        let opened: TransportEvent =
            serde_json::from_str(r#"{"type":"connection_opened"}"#).unwrap();
        assert_eq!(opened, TransportEvent::ConnectionOpened);
    }
}
