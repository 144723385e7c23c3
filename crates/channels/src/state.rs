use std::fmt;

use serde::Serialize;

use crate::transport::TransportEvent;

/// Lifecycle of one shared connection, as reported by its transport.
///
/// Re-enterable: a transport that retries on its own moves
/// `Disconnected -> Connecting` again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Created, `start()` not yet observed to do anything.
    #[default]
    Idle,
    Connecting,
    /// Handshake accepted; the socket may not be usable yet.
    Authenticated,
    /// Real-time socket is open; sends are expected to go through.
    Open,
    Disconnected,
}

impl ConnectionState {
    /// Apply one transport event.
    ///
    /// Message events leave the state untouched. A start failure lands in
    /// `Disconnected`, same as a dropped socket.
    #[must_use]
    pub fn on(self, event: &TransportEvent) -> Self {
        match event {
            TransportEvent::Connecting => Self::Connecting,
            TransportEvent::Authenticated(_) => Self::Authenticated,
            TransportEvent::ConnectionOpened => Self::Open,
            TransportEvent::Disconnect { .. } | TransportEvent::UnableToStart { .. } => {
                Self::Disconnected
            },
            TransportEvent::Message(_) => self,
        }
    }

    /// True once the handshake succeeded and until the next disconnect.
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated | Self::Open)
    }

    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Authenticated => "authenticated",
            Self::Open => "open",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{AuthenticatedInfo, Identity, RawMessage};

    fn authenticated() -> TransportEvent {
        TransportEvent::Authenticated(AuthenticatedInfo {
            self_identity: Identity::new("U1", "bot"),
            team: Identity::new("T1", "acme"),
        })
    }

    #[test]
    fn happy_path_reaches_open() {
        let state = ConnectionState::Idle
            .on(&TransportEvent::Connecting)
            .on(&authenticated())
            .on(&TransportEvent::ConnectionOpened);
        assert_eq!(state, ConnectionState::Open);
        assert!(state.is_authenticated());
    }

    #[test]
    fn messages_do_not_change_state() {
        let msg = TransportEvent::Message(RawMessage::new("C1", "hi"));
        assert_eq!(ConnectionState::Open.on(&msg), ConnectionState::Open);
        assert_eq!(ConnectionState::Idle.on(&msg), ConnectionState::Idle);
    }

    #[test]
    fn start_failure_and_drop_both_disconnect() {
        let failed = ConnectionState::Connecting.on(&TransportEvent::UnableToStart {
            error: "invalid_auth".into(),
        });
        assert_eq!(failed, ConnectionState::Disconnected);

        let dropped = ConnectionState::Open.on(&TransportEvent::Disconnect {
            error: None,
            code: Some(1006),
        });
        assert_eq!(dropped, ConnectionState::Disconnected);
        assert!(!dropped.is_authenticated());
    }

    #[test]
    fn reconnect_reenters_connecting() {
        let state = ConnectionState::Disconnected.on(&TransportEvent::Connecting);
        assert_eq!(state, ConnectionState::Connecting);
    }
}
