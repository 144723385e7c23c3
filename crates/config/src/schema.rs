//! Config file schema.

use {
    chatmux_channels::{InboundConfig, OutboundConfig},
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

use crate::{Context, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatmuxConfig {
    pub metrics: MetricsConfig,
    /// Node instances in declaration order.
    #[serde(rename = "node", alias = "nodes")]
    pub nodes: Vec<NodeDefinition>,
}

impl ChatmuxConfig {
    pub fn node(&self, id: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

/// Node role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Sends input payloads to a channel.
    Speaker,
    /// Forwards messages from watched channels.
    Auditor,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Speaker => write!(f, "speaker"),
            Self::Auditor => write!(f, "auditor"),
        }
    }
}

/// One configured node. Everything besides `id` and `kind` is handed to the
/// port as its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: String,
    pub kind: NodeKind,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl NodeDefinition {
    pub fn outbound_config(&self) -> Result<OutboundConfig> {
        serde_json::from_value(Value::Object(self.settings.clone()))
            .with_context(|| format!("node '{}': invalid speaker settings", self.id))
    }

    pub fn inbound_config(&self) -> Result<InboundConfig> {
        serde_json::from_value(Value::Object(self.settings.clone()))
            .with_context(|| format!("node '{}': invalid auditor settings", self.id))
    }
}
