use std::sync::Arc;

use {
    secrecy::ExposeSecret,
    serde::{Deserialize, Serialize},
    serde_json::Value,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use chatmux_metrics::{counter, messages};

use {
    super::{ChannelTarget, PortLink, status_for},
    crate::{
        Error, Result,
        bus::{Scope, Topic},
        config::OutboundConfig,
        host::{NodeContext, NodeStatus},
        registry::ConnectionRegistry,
    },
};

/// Text sent in place of an empty payload.
pub const EMPTY_PAYLOAD_PLACEHOLDER: &str =
    "Nothing to send: pass a `payload` property on the input message";

/// Input accepted by an outbound port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub channel: Option<ChannelTarget>,
}

impl OutboundMessage {
    pub fn new(payload: impl Into<Value>, channel: ChannelTarget) -> Self {
        Self {
            payload: Some(payload.into()),
            channel: Some(channel),
        }
    }

    /// Payload as message text. Strings are sent as-is, other values as
    /// JSON. Null and blank strings yield `None`.
    pub fn payload_text(&self) -> Option<String> {
        let text = match self.payload.as_ref()? {
            Value::Null => return None,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Result of one accepted input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the transport. Delivery itself is not confirmed.
    Sent { channel_id: String },
    /// No target given and the default channel did not resolve.
    ChannelNotFound,
}

/// Speaker node: sends payloads through a shared connection and mirrors its
/// open/closed state as node status.
pub struct OutboundPort {
    link: PortLink,
    default_channel: Option<String>,
    node: Arc<dyn NodeContext>,
}

impl OutboundPort {
    pub fn new(
        config: &OutboundConfig,
        registry: Arc<ConnectionRegistry>,
        node: Arc<dyn NodeContext>,
    ) -> Result<Self> {
        let handle = registry.acquire(config.api_token.expose_secret())?;
        let scope = Scope::Credential(handle.credential().clone());
        let bus = registry.bus().clone();
        let link = PortLink::new(node.id(), registry, handle.clone());

        // Initial status goes out before any subscription can report a newer one.
        let before = handle.state();
        let initial = if before.is_open() {
            NodeStatus::connected()
        } else {
            NodeStatus::connecting()
        };
        node.status(initial.clone());

        let n = Arc::clone(&node);
        link.hold(bus.subscribe(Topic::ConnectionOpened, scope.clone(), move |_| {
            n.status(NodeStatus::connected());
        }));
        for topic in [Topic::Disconnect, Topic::UnableToStart] {
            let n = Arc::clone(&node);
            link.hold(bus.subscribe(topic, scope.clone(), move |_| {
                n.status(NodeStatus::disconnected());
            }));
        }

        // A transition between the first read and the subscriptions was not
        // delivered to them.
        let after = handle.state();
        if after != before {
            let settled = status_for(after, after.is_open());
            if settled != initial {
                node.status(settled);
            }
        }
        debug!(node = node.id(), credential = %handle.credential(), "outbound port ready");

        Ok(Self {
            link,
            default_channel: config.default_channel().map(str::to_string),
            node,
        })
    }

    /// Send one input. An empty payload sends
    /// [`EMPTY_PAYLOAD_PLACEHOLDER`]. The target is the message's channel,
    /// else the configured default.
    pub fn input(&self, message: &OutboundMessage) -> Result<SendOutcome> {
        if self.link.is_closed() {
            return Err(Error::unavailable("outbound port is closed"));
        }
        let handle = &self.link.handle;

        let target = message.channel.as_ref();
        let channel_id = match (
            target.and_then(|t| t.id.as_deref()),
            target.and_then(|t| t.name.as_deref()),
        ) {
            (Some(id), _) if !id.trim().is_empty() => Some(id.trim().to_string()),
            (_, Some(name)) => handle.resolve_channel(name).map(|c| c.id),
            _ => self
                .default_channel
                .as_deref()
                .and_then(|name| handle.resolve_channel(name))
                .map(|c| c.id),
        };
        let Some(channel_id) = channel_id else {
            warn!(
                node = self.node.id(),
                default_channel = ?self.default_channel,
                "channel not found, nothing sent"
            );
            return Ok(SendOutcome::ChannelNotFound);
        };

        let text = message
            .payload_text()
            .unwrap_or_else(|| EMPTY_PAYLOAD_PLACEHOLDER.to_string());
        handle.send_message(&text, &channel_id);
        #[cfg(feature = "metrics")]
        counter!(messages::SENT_TOTAL).increment(1);
        debug!(node = self.node.id(), channel_id = %channel_id, "message handed to transport");

        Ok(SendOutcome::Sent { channel_id })
    }

    /// Release the connection and every subscription. Safe to call twice.
    pub fn close(&self) {
        self.link.close();
    }

    pub fn is_closed(&self) -> bool {
        self.link.is_closed()
    }
}

impl std::fmt::Debug for OutboundPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundPort")
            .field("node", &self.node.id())
            .field("credential", self.link.handle.credential())
            .field("default_channel", &self.default_channel)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        bus::EventBus,
        directory::InMemoryDirectory,
        testing::{FakeTransportFactory, RecordingNode},
        transport::TransportEvent,
    };

    fn setup() -> (Arc<ConnectionRegistry>, Arc<FakeTransportFactory>) {
        let directory = InMemoryDirectory::new()
            .with_channel("C1", "general")
            .with_group("G7", "ops");
        let factory = Arc::new(FakeTransportFactory::new(directory));
        let registry = Arc::new(ConnectionRegistry::new(EventBus::new(), factory.clone()));
        (registry, factory)
    }

    #[test]
    fn payload_text_rules() {
        let msg = |v: Value| OutboundMessage {
            payload: Some(v),
            channel: None,
        };
        assert_eq!(msg(json!("hi")).payload_text().as_deref(), Some("hi"));
        assert_eq!(msg(json!(42)).payload_text().as_deref(), Some("42"));
        assert_eq!(msg(json!({"a":1})).payload_text().as_deref(), Some(r#"{"a":1}"#));
        assert!(msg(json!("  ")).payload_text().is_none());
        assert!(msg(Value::Null).payload_text().is_none());
        assert!(OutboundMessage::default().payload_text().is_none());
    }

    #[test]
    fn empty_payload_sends_placeholder() {
        let (registry, factory) = setup();
        let node = Arc::new(RecordingNode::new("speaker"));
        let port = OutboundPort::new(&OutboundConfig::new("tok1"), registry, node).unwrap();

        let outcome = port
            .input(&OutboundMessage::new("", ChannelTarget::id("C1")))
            .unwrap();
        assert_eq!(outcome, SendOutcome::Sent {
            channel_id: "C1".into()
        });

        let transport = factory.latest_by_token("tok1").unwrap();
        assert_eq!(transport.sent(), vec![(
            EMPTY_PAYLOAD_PLACEHOLDER.to_string(),
            "C1".to_string()
        )]);
    }

    #[test]
    fn default_channel_resolves_group_first() {
        let (registry, factory) = setup();
        let node = Arc::new(RecordingNode::new("speaker"));
        let config = OutboundConfig::new("tok1").with_channel("ops");
        let port = OutboundPort::new(&config, registry, node).unwrap();

        let outcome = port
            .input(&OutboundMessage {
                payload: Some(json!("deploy done")),
                channel: None,
            })
            .unwrap();
        assert_eq!(outcome, SendOutcome::Sent {
            channel_id: "G7".into()
        });
        assert_eq!(factory.latest_by_token("tok1").unwrap().sent()[0].1, "G7");
    }

    #[test]
    fn unresolved_channel_sends_nothing() {
        let (registry, factory) = setup();
        let node = Arc::new(RecordingNode::new("speaker"));
        let config = OutboundConfig::new("tok1").with_channel("missing");
        let port = OutboundPort::new(&config, registry, node).unwrap();

        let outcome = port.input(&OutboundMessage::default()).unwrap();
        assert_eq!(outcome, SendOutcome::ChannelNotFound);
        let by_name = port
            .input(&OutboundMessage::new("x", ChannelTarget::name("nope")))
            .unwrap();
        assert_eq!(by_name, SendOutcome::ChannelNotFound);
        assert!(factory.latest_by_token("tok1").unwrap().sent().is_empty());
    }

    #[test]
    fn status_follows_connection() {
        let (registry, factory) = setup();
        let node = Arc::new(RecordingNode::new("speaker"));
        let _port =
            OutboundPort::new(&OutboundConfig::new("tok1"), registry, node.clone()).unwrap();
        let transport = factory.latest_by_token("tok1").unwrap();

        transport.open();
        transport.emit(TransportEvent::Disconnect {
            error: None,
            code: Some(1006),
        });

        let texts: Vec<String> = node.statuses().into_iter().map(|s| s.text).collect();
        assert_eq!(texts, ["connecting", "connected", "disconnected"]);
    }

    #[test]
    fn disconnect_during_setup_is_not_overwritten() {
        let factory = Arc::new(FakeTransportFactory::new(InMemoryDirectory::new()).auto_open());
        let registry = Arc::new(ConnectionRegistry::new(EventBus::new(), factory.clone()));
        // Fires before the port has subscribed.
        let node = Arc::new(RecordingNode::new("speaker").on_first_status(move || {
            factory
                .latest_by_token("tok1")
                .unwrap()
                .emit(TransportEvent::Disconnect {
                    error: None,
                    code: Some(1006),
                });
        }));
        let _port =
            OutboundPort::new(&OutboundConfig::new("tok1"), registry, node.clone()).unwrap();

        let texts: Vec<String> = node.statuses().into_iter().map(|s| s.text).collect();
        assert_eq!(texts, ["connected", "disconnected"]);
    }

    #[test]
    fn open_during_setup_is_reported() {
        let (registry, factory) = setup();
        let node = Arc::new(RecordingNode::new("speaker").on_first_status(move || {
            factory.latest_by_token("tok1").unwrap().open();
        }));
        let _port =
            OutboundPort::new(&OutboundConfig::new("tok1"), registry, node.clone()).unwrap();

        let texts: Vec<String> = node.statuses().into_iter().map(|s| s.text).collect();
        assert_eq!(texts, ["connecting", "connected"]);
    }

    #[test]
    fn closed_port_rejects_input_and_releases() {
        let (registry, _factory) = setup();
        let node = Arc::new(RecordingNode::new("speaker"));
        let port =
            OutboundPort::new(&OutboundConfig::new("tok1"), Arc::clone(&registry), node).unwrap();
        assert_eq!(registry.len(), 1);

        port.close();
        port.close();
        assert!(registry.is_empty());
        assert_eq!(registry.bus().total_subscribers(), 0);
        assert!(matches!(
            port.input(&OutboundMessage::default()),
            Err(Error::Unavailable { .. })
        ));
    }

    #[test]
    fn empty_token_fails_construction() {
        let (registry, _factory) = setup();
        let node = Arc::new(RecordingNode::new("speaker"));
        let err = OutboundPort::new(&OutboundConfig::new(" "), Arc::clone(&registry), node)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredential));
        assert!(registry.is_empty());
    }
}
