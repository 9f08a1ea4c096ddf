//! Entity kinds and per-kind containers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The four kinds of catalog entity. Ids are only unique within a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Track,
    Artist,
    Label,
    Tracklist,
}

impl EntityKind {
    /// All kinds, in declaration order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Track,
        EntityKind::Artist,
        EntityKind::Label,
        EntityKind::Tracklist,
    ];

    /// Order in which the crawl loop scans the pending sets. Tracklists fan
    /// out into the most unseen tracks, so they go first.
    pub const PRIORITY: [EntityKind; 4] = [
        EntityKind::Tracklist,
        EntityKind::Track,
        EntityKind::Artist,
        EntityKind::Label,
    ];

    /// Singular name, also the URL path segment on the remote site.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Track => "track",
            EntityKind::Artist => "artist",
            EntityKind::Label => "label",
            EntityKind::Tracklist => "tracklist",
        }
    }

    /// Plural name used for record logs and checkpoint fields.
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Track => "tracks",
            EntityKind::Artist => "artists",
            EntityKind::Label => "labels",
            EntityKind::Tracklist => "tracklists",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per entity kind, with the kinds as named fields.
///
/// Serializes as `{"tracks": .., "artists": .., "labels": .., "tracklists": ..}`,
/// which is also the checkpoint file layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerKind<T> {
    #[serde(default)]
    pub tracks: T,
    #[serde(default)]
    pub artists: T,
    #[serde(default)]
    pub labels: T,
    #[serde(default)]
    pub tracklists: T,
}

impl<T> PerKind<T> {
    /// Build a container by evaluating `f` for every kind.
    pub fn from_fn(mut f: impl FnMut(EntityKind) -> T) -> Self {
        Self {
            tracks: f(EntityKind::Track),
            artists: f(EntityKind::Artist),
            labels: f(EntityKind::Label),
            tracklists: f(EntityKind::Tracklist),
        }
    }

    pub fn get(&self, kind: EntityKind) -> &T {
        match kind {
            EntityKind::Track => &self.tracks,
            EntityKind::Artist => &self.artists,
            EntityKind::Label => &self.labels,
            EntityKind::Tracklist => &self.tracklists,
        }
    }

    pub fn get_mut(&mut self, kind: EntityKind) -> &mut T {
        match kind {
            EntityKind::Track => &mut self.tracks,
            EntityKind::Artist => &mut self.artists,
            EntityKind::Label => &mut self.labels,
            EntityKind::Tracklist => &mut self.tracklists,
        }
    }

    /// Map every value, keeping the kind layout.
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerKind<U> {
        PerKind::from_fn(|kind| f(self.get(kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_starts_with_tracklists() {
        assert_eq!(EntityKind::PRIORITY[0], EntityKind::Tracklist);
        assert_eq!(EntityKind::PRIORITY[3], EntityKind::Label);
    }

    #[test]
    fn test_per_kind_get_mut() {
        let mut counts: PerKind<usize> = PerKind::default();
        *counts.get_mut(EntityKind::Artist) += 2;
        assert_eq!(counts.artists, 2);
        assert_eq!(*counts.get(EntityKind::Track), 0);
    }

    #[test]
    fn test_per_kind_field_names() {
        let value = serde_json::to_value(PerKind::from_fn(|k| k.as_str())).unwrap();
        assert_eq!(value["tracklists"], "tracklist");
        assert_eq!(value["labels"], "label");
    }
}
