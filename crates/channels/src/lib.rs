//! Shared chat connections multiplexed across many nodes.
//!
//! A [`ConnectionRegistry`] keeps at most one live connection per API token
//! and reference-counts the ports using it. Connections publish their
//! lifecycle and message events on an [`EventBus`]; [`OutboundPort`]s and
//! [`InboundPort`]s subscribe to the events of their own credential and
//! release both the connection and their subscriptions on close.

pub mod bus;
pub mod config;
pub mod credential;
pub mod directory;
pub mod error;
pub mod filter;
pub mod handle;
pub mod host;
pub mod logger;
pub mod ports;
pub mod registry;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

pub use {
    bus::{BusEvent, EventBus, Scope, Subscription, Topic},
    config::{InboundConfig, OutboundConfig},
    credential::Credential,
    directory::{ChannelDirectory, ChannelKind, ChannelRef, InMemoryDirectory},
    error::{Error, Result},
    filter::{WatchList, is_watched},
    handle::{ConnectionHandle, TransportListener, WeakConnectionHandle},
    host::{NodeContext, NodeStatus, StatusFill, StatusShape},
    logger::ConnectionLogger,
    ports::{
        ChannelTarget, EMPTY_PAYLOAD_PLACEHOLDER, InboundEvent, InboundPort, OutboundMessage,
        OutboundPort, SendOutcome,
    },
    registry::{ConnectionRegistry, ConnectionSnapshot},
    state::ConnectionState,
    transport::{
        AuthenticatedInfo, Identity, RawMessage, Transport, TransportEvent, TransportFactory,
    },
};
