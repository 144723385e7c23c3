//! Metric names and label keys.

/// Shared connection lifecycle metrics
pub mod connections {
    /// Number of live connections held by the registry
    pub const ACTIVE: &str = "chatmux_connections_active";
    /// Total number of physical connections created
    pub const OPENED_TOTAL: &str = "chatmux_connections_opened_total";
    /// Total number of connections torn down after the last release
    pub const CLOSED_TOTAL: &str = "chatmux_connections_closed_total";
    /// Total number of transport start failures
    pub const START_FAILURES_TOTAL: &str = "chatmux_connection_start_failures_total";
}

/// Event bus metrics
pub mod bus {
    /// Total number of events published, labelled by topic
    pub const EVENTS_PUBLISHED_TOTAL: &str = "chatmux_bus_events_published_total";
    /// Number of live subscriptions
    pub const SUBSCRIPTIONS: &str = "chatmux_bus_subscriptions";
}

/// Inbound/outbound message metrics
pub mod messages {
    /// Messages forwarded downstream by inbound ports
    pub const FORWARDED_TOTAL: &str = "chatmux_messages_forwarded_total";
    /// Messages dropped by inbound ports, labelled by reason
    pub const DROPPED_TOTAL: &str = "chatmux_messages_dropped_total";
    /// Messages handed to the transport by outbound ports
    pub const SENT_TOTAL: &str = "chatmux_messages_sent_total";
}

/// Label keys
pub mod labels {
    pub const TOPIC: &str = "topic";
    pub const REASON: &str = "reason";
}
