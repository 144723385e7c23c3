//! Watch-list filtering for inbound ports.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::directory::{ChannelKind, ChannelRef};

/// Channel names an inbound port listens to. Empty means every channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchList(Vec<String>);

impl WatchList {
    /// Parse the comma-separated config form. Entries are trimmed, a leading
    /// `#` is dropped and blank entries are skipped, so `" "` watches
    /// everything.
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(',')
                .map(|s| s.trim())
                .map(|s| s.strip_prefix('#').unwrap_or(s).trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for WatchList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

impl<S: Into<String>> FromIterator<S> for WatchList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.trim().is_empty())
                .collect(),
        )
    }
}

/// Decide whether a message posted in `channel_id` should reach a port.
///
/// Direct messages always pass. An empty list passes everything. Otherwise
/// each configured name is resolved through `resolve` and the message passes
/// when one of them has this id. Names that do not resolve never match.
pub fn is_watched<F>(channel_id: &str, watch_list: &WatchList, resolve: F) -> bool
where
    F: Fn(&str) -> Option<ChannelRef>,
{
    if ChannelKind::from_id(channel_id).is_some_and(ChannelKind::is_direct_message) {
        return true;
    }
    if watch_list.is_empty() {
        return true;
    }
    watch_list
        .names()
        .iter()
        .filter_map(|name| resolve(name))
        .any(|found| found.id == channel_id)
}
