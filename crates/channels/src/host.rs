//! What a port needs from the runtime hosting it.

use serde::{Deserialize, Serialize};

/// Indicator colour shown next to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFill {
    Red,
    Green,
    Yellow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusShape {
    Dot,
    Ring,
}

/// Status badge reported to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub fill: StatusFill,
    pub shape: StatusShape,
    pub text: String,
}

impl NodeStatus {
    pub fn new(fill: StatusFill, shape: StatusShape, text: impl Into<String>) -> Self {
        Self {
            fill,
            shape,
            text: text.into(),
        }
    }

    pub fn connected() -> Self {
        Self::new(StatusFill::Green, StatusShape::Dot, "connected")
    }

    pub fn disconnected() -> Self {
        Self::new(StatusFill::Red, StatusShape::Dot, "disconnected")
    }

    pub fn connecting() -> Self {
        Self::new(StatusFill::Yellow, StatusShape::Ring, "connecting")
    }
}

/// Host-side surface of one instantiated node.
///
/// Both methods may be called from bus callbacks and must not block.
pub trait NodeContext: Send + Sync {
    /// Node id, used in logs.
    fn id(&self) -> &str;

    fn status(&self, status: NodeStatus);

    /// Emit a message to the node's downstream wiring.
    fn send(&self, message: serde_json::Value);
}
