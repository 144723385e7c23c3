use std::sync::Arc;

use {
    secrecy::ExposeSecret,
    serde::{Deserialize, Serialize},
    tracing::{debug, trace, warn},
};

#[cfg(feature = "metrics")]
use chatmux_metrics::{counter, labels, messages};

use {
    super::{ChannelTarget, PortLink, status_for},
    crate::{
        Result,
        bus::{BusEvent, Scope, Topic},
        config::InboundConfig,
        directory::ChannelKind,
        filter::{WatchList, is_watched},
        handle::WeakConnectionHandle,
        host::{NodeContext, NodeStatus},
        registry::ConnectionRegistry,
        transport::{RawMessage, TransportEvent},
    },
};

/// Normalized message emitted downstream by an inbound port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub channel: ChannelTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

impl InboundEvent {
    fn from_raw(raw: &RawMessage, channel: ChannelTarget) -> Self {
        Self {
            channel,
            text: raw.text.clone(),
            user: raw.user.clone(),
            ts: raw.ts.clone(),
            subtype: raw.subtype.clone(),
        }
    }
}

/// Auditor node: forwards messages from watched channels downstream and
/// mirrors authentication state as node status.
pub struct InboundPort {
    link: PortLink,
    watch_list: WatchList,
    node: Arc<dyn NodeContext>,
}

impl InboundPort {
    pub fn new(
        config: &InboundConfig,
        registry: Arc<ConnectionRegistry>,
        node: Arc<dyn NodeContext>,
    ) -> Result<Self> {
        let handle = registry.acquire(config.api_token.expose_secret())?;
        let watch_list = config.watch_list();
        let scope = Scope::Credential(handle.credential().clone());
        let bus = registry.bus().clone();
        let link = PortLink::new(node.id(), registry, handle.clone());

        // Initial status goes out before any subscription can report a newer one.
        let before = handle.state();
        let initial = if before.is_authenticated() {
            NodeStatus::connected()
        } else {
            NodeStatus::connecting()
        };
        node.status(initial.clone());

        let weak = handle.downgrade();
        let list = watch_list.clone();
        let n = Arc::clone(&node);
        link.hold(bus.subscribe(Topic::Message, scope.clone(), move |event| {
            forward(event, &weak, &list, n.as_ref());
        }));

        let n = Arc::clone(&node);
        link.hold(bus.subscribe(Topic::Authenticated, scope.clone(), move |_| {
            n.status(NodeStatus::connected());
        }));
        for topic in [Topic::Disconnect, Topic::UnableToStart] {
            let n = Arc::clone(&node);
            link.hold(bus.subscribe(topic, scope.clone(), move |_| {
                n.status(NodeStatus::disconnected());
            }));
        }

        let after = handle.state();
        if after != before {
            let settled = status_for(after, after.is_authenticated());
            if settled != initial {
                node.status(settled);
            }
        }
        debug!(
            node = node.id(),
            credential = %handle.credential(),
            channels = %watch_list,
            "inbound port ready"
        );

        Ok(Self {
            link,
            watch_list,
            node,
        })
    }

    pub fn watch_list(&self) -> &WatchList {
        &self.watch_list
    }

    /// Release the connection and every subscription. Safe to call twice.
    pub fn close(&self) {
        self.link.close();
    }

    pub fn is_closed(&self) -> bool {
        self.link.is_closed()
    }
}

impl std::fmt::Debug for InboundPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundPort")
            .field("node", &self.node.id())
            .field("credential", self.link.handle.credential())
            .field("watch_list", &self.watch_list)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn forward(
    event: &BusEvent,
    handle: &WeakConnectionHandle,
    watch_list: &WatchList,
    node: &dyn NodeContext,
) {
    let TransportEvent::Message(raw) = &event.event else {
        return;
    };
    if raw.is_deletion() {
        trace!(node = node.id(), channel_id = %raw.channel, "deletion notice dropped");
        #[cfg(feature = "metrics")]
        counter!(messages::DROPPED_TOTAL, labels::REASON => "deleted").increment(1);
        return;
    }
    let Some(handle) = handle.upgrade() else {
        return;
    };
    if !is_watched(&raw.channel, watch_list, |name| handle.resolve_channel(name)) {
        trace!(node = node.id(), channel_id = %raw.channel, "channel not watched");
        #[cfg(feature = "metrics")]
        counter!(messages::DROPPED_TOTAL, labels::REASON => "unwatched").increment(1);
        return;
    }

    let channel = handle
        .channel_by_id(&raw.channel)
        .map(ChannelTarget::from)
        .unwrap_or_else(|| ChannelTarget {
            id: Some(raw.channel.clone()),
            name: None,
            kind: ChannelKind::from_id(&raw.channel),
        });
    match serde_json::to_value(InboundEvent::from_raw(raw, channel)) {
        Ok(value) => {
            node.send(value);
            #[cfg(feature = "metrics")]
            counter!(messages::FORWARDED_TOTAL).increment(1);
        },
        Err(e) => warn!(node = node.id(), error = %e, "failed to encode inbound event"),
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
        transport::MESSAGE_DELETED_SUBTYPE,
    };

    fn setup() -> (Arc<ConnectionRegistry>, Arc<FakeTransportFactory>) {
        let directory = InMemoryDirectory::new()
            .with_channel("C1", "general")
            .with_channel("C2", "sales")
            .with_dm("D1", "alice");
        let factory = Arc::new(FakeTransportFactory::new(directory));
        let registry = Arc::new(ConnectionRegistry::new(EventBus::new(), factory.clone()));
        (registry, factory)
    }

    #[test]
    fn forwards_normalized_event() {
        let (registry, factory) = setup();
        let node = Arc::new(RecordingNode::new("auditor"));
        let _port =
            InboundPort::new(&InboundConfig::new("tok1", ""), registry, node.clone()).unwrap();

        factory
            .latest_by_token("tok1")
            .unwrap()
            .deliver(RawMessage::new("C1", "hello").with_user("U1"));

        assert_eq!(
            node.sent(),
            vec![json!({
                "channel": {"id": "C1", "name": "general", "kind": "public_channel"},
                "text": "hello",
                "user": "U1"
            })]
        );
    }

    #[test]
    fn unknown_channel_still_carries_id() {
        let (registry, factory) = setup();
        let node = Arc::new(RecordingNode::new("auditor"));
        let _port =
            InboundPort::new(&InboundConfig::new("tok1", ""), registry, node.clone()).unwrap();

        factory
            .latest_by_token("tok1")
            .unwrap()
            .deliver(RawMessage::new("G42", "psst"));
        assert_eq!(node.sent()[0]["channel"], json!({"id": "G42", "kind": "group"}));
    }

    #[test]
    fn deletions_and_unwatched_are_dropped() {
        let (registry, factory) = setup();
        let node = Arc::new(RecordingNode::new("auditor"));
        let _port =
            InboundPort::new(&InboundConfig::new("tok1", "general"), registry, node.clone())
                .unwrap();
        let transport = factory.latest_by_token("tok1").unwrap();

        transport.deliver(RawMessage::new("C1", "gone").with_subtype(MESSAGE_DELETED_SUBTYPE));
        transport.deliver(RawMessage::new("C2", "not watched"));
        assert!(node.sent().is_empty());

        transport.deliver(RawMessage::new("D1", "direct"));
        transport.deliver(RawMessage::new("C1", "watched"));
        let texts: Vec<_> = node.sent().iter().map(|v| v["text"].clone()).collect();
        assert_eq!(texts, [json!("direct"), json!("watched")]);
    }

    #[test]
    fn status_tracks_authentication() {
        let (registry, factory) = setup();
        let node = Arc::new(RecordingNode::new("auditor"));
        let _port =
            InboundPort::new(&InboundConfig::new("tok1", ""), registry, node.clone()).unwrap();
        let transport = factory.latest_by_token("tok1").unwrap();

        transport.open();
        transport.emit(TransportEvent::Disconnect {
            error: Some("socket closed".into()),
            code: None,
        });
        let texts: Vec<String> = node.statuses().into_iter().map(|s| s.text).collect();
        assert_eq!(texts, ["connecting", "connected", "disconnected"]);
    }

    #[test]
    fn disconnect_during_setup_is_not_overwritten() {
        let factory = Arc::new(FakeTransportFactory::new(InMemoryDirectory::new()).auto_open());
        let registry = Arc::new(ConnectionRegistry::new(EventBus::new(), factory.clone()));
        let node = Arc::new(RecordingNode::new("auditor").on_first_status(move || {
            factory
                .latest_by_token("tok1")
                .unwrap()
                .emit(TransportEvent::Disconnect {
                    error: Some("socket closed".into()),
                    code: None,
                });
        }));
        let _port =
            InboundPort::new(&InboundConfig::new("tok1", ""), registry, node.clone()).unwrap();

        let texts: Vec<String> = node.statuses().into_iter().map(|s| s.text).collect();
        assert_eq!(texts, ["connected", "disconnected"]);
    }

    #[test]
    fn messages_for_other_credentials_are_ignored() {
        let (registry, factory) = setup();
        let node = Arc::new(RecordingNode::new("auditor"));
        let _port = InboundPort::new(
            &InboundConfig::new("tok1", ""),
            Arc::clone(&registry),
            node.clone(),
        )
        .unwrap();
        let other = registry.acquire("tok2").unwrap();

        factory
            .latest(other.credential())
            .unwrap()
            .deliver(RawMessage::new("C1", "elsewhere"));
        assert!(node.sent().is_empty());
    }
}
