use serde::{Deserialize, Serialize};

pub mod schedule;

pub use schedule::*;

/// A channel from the static catalog
///
/// `epg_id` is the code the provider uses for the channel inside the EPG
/// export, `source` the multicast address appended to the playlist URI
/// prefix. `stream_uri`, when set, replaces the constructed URI entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub number: u32,
    pub name: String,
    pub epg_id: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_uri: Option<String>,
    #[serde(default = "default_include_in_playlist")]
    pub include_in_playlist: bool,
}

fn default_include_in_playlist() -> bool {
    true
}

impl Channel {
    /// Resolve the stream URI for the playlist
    pub fn resolve_stream_uri(&self, uri_prefix: &str) -> String {
        match &self.stream_uri {
            Some(uri) => uri.clone(),
            None => format!("{}{}", uri_prefix, self.source),
        }
    }
}

/// Read-only, ordered channel catalog
#[derive(Debug, Clone, Default)]
pub struct ChannelCatalog {
    channels: Vec<Channel>,
}

impl ChannelCatalog {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    /// Channels in declared order
    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn find_by_epg_id(&self, epg_id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.epg_id == epg_id)
    }

    /// Channels sorted by their declared number; ties keep declaration order
    pub fn by_number(&self) -> Vec<&Channel> {
        let mut sorted: Vec<&Channel> = self.channels.iter().collect();
        sorted.sort_by_key(|c| c.number);
        sorted
    }
}
