use tracing::{debug, error, info, trace, warn};

use crate::{
    bus::{BusEvent, EventBus, Scope, Subscription, Topic},
    transport::TransportEvent,
};

/// Bus subscriber that logs every connection event.
///
/// Holds one subscription per topic; dropping it detaches.
#[derive(Debug)]
pub struct ConnectionLogger {
    subscriptions: Vec<Subscription>,
}

impl ConnectionLogger {
    pub fn attach(bus: &EventBus) -> Self {
        let subscriptions = Topic::ALL
            .iter()
            .map(|&topic| bus.subscribe(topic, Scope::All, log_event))
            .collect();
        Self { subscriptions }
    }

    pub fn detach(self) {
        for subscription in self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

fn log_event(event: &BusEvent) {
    let credential = &event.credential;
    match &event.event {
        TransportEvent::Connecting => debug!(credential = %credential, "connecting"),
        TransportEvent::Authenticated(info) => info!(
            credential = %credential,
            user = %info.self_identity.name,
            team = %info.team.name,
            "logged in as @{} of team {}",
            info.self_identity.name,
            info.team.name
        ),
        TransportEvent::ConnectionOpened => info!(credential = %credential, "connection opened"),
        TransportEvent::Disconnect { error, code } => warn!(
            credential = %credential,
            error = error.as_deref().unwrap_or(""),
            code = ?code,
            "disconnected"
        ),
        TransportEvent::Message(raw) => trace!(
            credential = %credential,
            channel_id = %raw.channel,
            subtype = raw.subtype.as_deref().unwrap_or(""),
            "received a message"
        ),
        TransportEvent::UnableToStart { error } => {
            error!(credential = %credential, error = %error, "unable to connect")
        },
    }
}
