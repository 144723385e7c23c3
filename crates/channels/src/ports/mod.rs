//! Speaker and auditor ports: the two node roles that share registry
//! connections.

mod inbound;
mod outbound;

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use {
    serde::{Deserialize, Serialize},
    tracing::debug,
};

pub use {
    inbound::{InboundEvent, InboundPort},
    outbound::{EMPTY_PAYLOAD_PLACEHOLDER, OutboundMessage, OutboundPort, SendOutcome},
};

use crate::{
    bus::Subscription,
    directory::{ChannelKind, ChannelRef},
    handle::ConnectionHandle,
    host::NodeStatus,
    registry::ConnectionRegistry,
    state::ConnectionState,
};

/// Status a port shows for a connection state. `ready` is whether the state
/// reached what the port waits for.
fn status_for(state: ConnectionState, ready: bool) -> NodeStatus {
    if ready {
        NodeStatus::connected()
    } else if state == ConnectionState::Disconnected {
        NodeStatus::disconnected()
    } else {
        NodeStatus::connecting()
    }
}

/// Channel as it appears in port messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChannelKind>,
}

impl ChannelTarget {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

impl From<ChannelRef> for ChannelTarget {
    fn from(found: ChannelRef) -> Self {
        Self {
            id: Some(found.id),
            name: Some(found.name),
            kind: Some(found.kind),
        }
    }
}

/// A port's hold on one registry connection plus its bus subscriptions.
///
/// Closing releases the registry reference and drops every subscription.
/// Only the first close has any effect.
struct PortLink {
    node_id: String,
    registry: Arc<ConnectionRegistry>,
    handle: ConnectionHandle,
    subscriptions: Mutex<Vec<Subscription>>,
    closed: AtomicBool,
}

impl PortLink {
    fn new(node_id: &str, registry: Arc<ConnectionRegistry>, handle: ConnectionHandle) -> Self {
        Self {
            node_id: node_id.to_string(),
            registry,
            handle,
            subscriptions: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn hold(&self, subscription: Subscription) {
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(subscription);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let subscriptions: Vec<Subscription> = self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        let count = subscriptions.len();
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        self.registry.release(self.handle.credential());
        debug!(
            node = %self.node_id,
            credential = %self.handle.credential(),
            unsubscribed = count,
            "port closed"
        );
    }
}

impl Drop for PortLink {
    fn drop(&mut self) {
        self.close();
    }
}
