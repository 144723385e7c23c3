//! Channel lookup against the transport's workspace directory.

use serde::{Deserialize, Serialize};

/// Kind of conversation a channel id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    DirectMessage,
    /// Private channel.
    Group,
    PublicChannel,
}

impl ChannelKind {
    /// Infer the kind from the platform's id prefix (`D…`, `G…`, `C…`).
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().chars().next() {
            Some('D') => Some(Self::DirectMessage),
            Some('G') => Some(Self::Group),
            Some('C') => Some(Self::PublicChannel),
            _ => None,
        }
    }

    pub fn is_direct_message(self) -> bool {
        self == Self::DirectMessage
    }
}

/// A resolved conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: String,
    pub name: String,
    pub kind: ChannelKind,
}

impl ChannelRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
        }
    }
}

/// Named lookups per channel kind, implemented by the transport adapter.
///
/// Every method returns `None` for a miss; a missing channel is an expected
/// outcome, never an error.
pub trait ChannelDirectory: Send + Sync {
    fn channel_by_name(&self, name: &str) -> Option<ChannelRef>;
    fn group_by_name(&self, name: &str) -> Option<ChannelRef>;
    fn channel_by_id(&self, id: &str) -> Option<ChannelRef>;
    fn group_by_id(&self, id: &str) -> Option<ChannelRef>;
    fn dm_by_id(&self, id: &str) -> Option<ChannelRef>;
}

/// Find a conversation by id (DM, then group, then public channel).
pub fn lookup_id(directory: &dyn ChannelDirectory, id: &str) -> Option<ChannelRef> {
    directory
        .dm_by_id(id)
        .or_else(|| directory.group_by_id(id))
        .or_else(|| directory.channel_by_id(id))
}

/// Resolve a configured name or id.
///
/// Ids win; names fall back from groups to public channels. A leading `#`
/// on a name is ignored.
pub fn resolve(directory: &dyn ChannelDirectory, name_or_id: &str) -> Option<ChannelRef> {
    let key = name_or_id.trim();
    if key.is_empty() {
        return None;
    }
    if let Some(found) = lookup_id(directory, key) {
        return Some(found);
    }
    let name = key.strip_prefix('#').unwrap_or(key);
    directory
        .group_by_name(name)
        .or_else(|| directory.channel_by_name(name))
}

/// Directory backed by plain lists, for scripted and fake transports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryDirectory {
    pub channels: Vec<DirectoryEntry>,
    pub groups: Vec<DirectoryEntry>,
    pub dms: Vec<DirectoryEntry>,
}

/// One listed conversation. DMs use the peer's user name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: String,
    pub name: String,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_channel(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.channels.push(DirectoryEntry {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    #[must_use]
    pub fn with_group(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.groups.push(DirectoryEntry {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    #[must_use]
    pub fn with_dm(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.dms.push(DirectoryEntry {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    fn find(
        entries: &[DirectoryEntry],
        kind: ChannelKind,
        pred: impl Fn(&DirectoryEntry) -> bool,
    ) -> Option<ChannelRef> {
        entries
            .iter()
            .find(|e| pred(e))
            .map(|e| ChannelRef::new(e.id.clone(), e.name.clone(), kind))
    }
}

impl ChannelDirectory for InMemoryDirectory {
    fn channel_by_name(&self, name: &str) -> Option<ChannelRef> {
        Self::find(&self.channels, ChannelKind::PublicChannel, |e| e.name == name)
    }

    fn group_by_name(&self, name: &str) -> Option<ChannelRef> {
        Self::find(&self.groups, ChannelKind::Group, |e| e.name == name)
    }

    fn channel_by_id(&self, id: &str) -> Option<ChannelRef> {
        Self::find(&self.channels, ChannelKind::PublicChannel, |e| e.id == id)
    }

    fn group_by_id(&self, id: &str) -> Option<ChannelRef> {
        Self::find(&self.groups, ChannelKind::Group, |e| e.id == id)
    }

    fn dm_by_id(&self, id: &str) -> Option<ChannelRef> {
        Self::find(&self.dms, ChannelKind::DirectMessage, |e| e.id == id)
    }
}
