//! `chatmux run`: instantiate every configured node against a replay script.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    anyhow::Result,
    chatmux_channels::{
        ConnectionLogger, ConnectionRegistry, ConnectionSnapshot, EventBus, InboundPort,
        OutboundPort, SendOutcome,
    },
    chatmux_config::{ChatmuxConfig, NodeDefinition, NodeKind},
    serde_json::json,
    tracing::{info, warn},
};

use crate::{
    output::{JsonLines, JsonLinesNode},
    replay::{ReplayFactory, Script},
};

enum Port {
    Speaker(OutboundPort),
    Auditor(InboundPort),
}

impl Port {
    fn close(&self) {
        match self {
            Self::Speaker(port) => port.close(),
            Self::Auditor(port) => port.close(),
        }
    }
}

/// What a finished run looked like.
#[derive(Debug)]
pub struct RunSummary {
    pub nodes_started: usize,
    pub nodes_failed: usize,
    pub inputs_sent: usize,
    /// Registry state just before the nodes were closed.
    pub connections: Vec<ConnectionSnapshot>,
}

/// Run `script` against the nodes in `config`, then close every node.
///
/// Nodes whose settings are invalid are reported and skipped; the rest of
/// the flow still runs.
pub async fn run(
    config: &ChatmuxConfig,
    script: Script,
    linger: Duration,
    out: JsonLines,
) -> Result<RunSummary> {
    let bus = EventBus::new();
    let logger = ConnectionLogger::attach(&bus);
    let inputs = {
        let mut inputs = script.inputs.clone();
        inputs.sort_by_key(|i| i.after_ms);
        inputs
    };
    let duration = script.duration();
    let factory = Arc::new(ReplayFactory::new(Arc::new(script), out.clone()));
    let registry = Arc::new(ConnectionRegistry::new(bus.clone(), factory));

    let started = tokio::time::Instant::now();
    let mut ports: HashMap<String, Port> = HashMap::new();
    let mut nodes_failed = 0;
    for definition in &config.nodes {
        match start_node(definition, &registry, &out) {
            Ok(port) => {
                ports.insert(definition.id.clone(), port);
            },
            Err(e) => {
                nodes_failed += 1;
                warn!(node = %definition.id, error = %e, "node failed to start");
                out.emit(&json!({ "node": definition.id, "error": e.to_string() }));
            },
        }
    }
    info!(nodes = ports.len(), failed = nodes_failed, "nodes started");

    let mut inputs_sent = 0;
    for input in inputs {
        tokio::time::sleep_until(started + Duration::from_millis(input.after_ms)).await;
        match ports.get(&input.node) {
            Some(Port::Speaker(port)) => match port.input(&input.message) {
                Ok(SendOutcome::Sent { .. }) => inputs_sent += 1,
                Ok(SendOutcome::ChannelNotFound) => {},
                Err(e) => warn!(node = %input.node, error = %e, "input rejected"),
            },
            Some(Port::Auditor(_)) => {
                warn!(node = %input.node, "auditor nodes take no input");
            },
            None => warn!(node = %input.node, "input for unknown node"),
        }
    }

    tokio::time::sleep_until(started + duration + linger).await;

    let connections = registry.snapshot();
    out.emit(&json!({ "connections": connections }));

    let nodes_started = ports.len();
    for port in ports.values() {
        port.close();
    }
    registry.shutdown_all();
    logger.detach();

    Ok(RunSummary {
        nodes_started,
        nodes_failed,
        inputs_sent,
        connections,
    })
}

fn start_node(
    definition: &NodeDefinition,
    registry: &Arc<ConnectionRegistry>,
    out: &JsonLines,
) -> Result<Port> {
    let node = Arc::new(JsonLinesNode::new(definition.id.clone(), out.clone()));
    let port = match definition.kind {
        NodeKind::Speaker => Port::Speaker(OutboundPort::new(
            &definition.outbound_config()?,
            Arc::clone(registry),
            node,
        )?),
        NodeKind::Auditor => Port::Auditor(InboundPort::new(
            &definition.inbound_config()?,
            Arc::clone(registry),
            node,
        )?),
    };
    Ok(port)
}
