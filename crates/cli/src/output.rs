//! JSON-lines output shared by nodes and transports.

use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use {
    chatmux_channels::{NodeContext, NodeStatus},
    serde_json::{Value, json},
    tracing::warn,
};

/// Writes one JSON document per line. Cheap to clone; clones share the
/// writer so lines never interleave.
#[derive(Clone)]
pub struct JsonLines {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl JsonLines {
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// In-memory sink, for tests.
    #[cfg(test)]
    pub fn buffer() -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        (Self::new(Box::new(buffer.clone())), buffer)
    }

    pub fn emit(&self, value: &Value) {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(writer, "{value}").and_then(|()| writer.flush()) {
            warn!(error = %e, "failed to write output line");
        }
    }
}

/// Node context that reports status changes and downstream messages as
/// JSON lines.
pub struct JsonLinesNode {
    id: String,
    out: JsonLines,
}

impl JsonLinesNode {
    pub fn new(id: impl Into<String>, out: JsonLines) -> Self {
        Self {
            id: id.into(),
            out,
        }
    }
}

impl NodeContext for JsonLinesNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self, status: NodeStatus) {
        self.out.emit(&json!({ "node": self.id, "status": status }));
    }

    fn send(&self, message: Value) {
        self.out.emit(&json!({ "node": self.id, "output": message }));
    }
}

#[cfg(test)]
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
impl SharedBuffer {
    pub fn lines(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
