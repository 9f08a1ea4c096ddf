//! Catalog entity records and the cross-reference edges between them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{EntityKind, MediaLink};

/// A track page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,

    /// ISO 8601 duration as published (e.g. `PT5M32S`), `None` when unset
    #[serde(default)]
    pub duration: Option<String>,

    #[serde(default)]
    pub artists: BTreeSet<String>,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub tracklists: BTreeSet<String>,

    /// Tracks that remix this track
    #[serde(default)]
    pub remixes: BTreeSet<String>,
    /// Tracks this track remixes
    #[serde(default)]
    pub remix_of: BTreeSet<String>,
    /// Mashups built from this track
    #[serde(default)]
    pub mashups: BTreeSet<String>,
    /// Tracks used by this mashup
    #[serde(default)]
    pub mashup_tracks: BTreeSet<String>,

    #[serde(default)]
    pub medialinks: Vec<MediaLink>,
}

/// An artist or group page.
///
/// Alias and membership edges are recorded as seen on this page; the reverse
/// direction is only known once the other artist is fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub tracks: BTreeSet<String>,
    #[serde(default)]
    pub mashups: BTreeSet<String>,
    /// Sub-acts of a group
    #[serde(default)]
    pub members: BTreeSet<String>,
    /// Groups this artist belongs to
    #[serde(default)]
    pub part_of: BTreeSet<String>,
    #[serde(default)]
    pub remixes: BTreeSet<String>,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    #[serde(default)]
    pub tracks_featured: BTreeSet<String>,
    #[serde(default)]
    pub tracks_presented: BTreeSet<String>,
}

/// A record label page. Carries no outgoing edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// A DJ set / tracklist page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracklist {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub tracks: BTreeSet<String>,
}

impl Track {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Artist {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Label {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl Tracklist {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Any fetched entity.
///
/// Serializes as the bare record, without a kind tag; the kind is implied by
/// the log the record lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Track(Track),
    Artist(Artist),
    Label(Label),
    Tracklist(Tracklist),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Track(_) => EntityKind::Track,
            Entity::Artist(_) => EntityKind::Artist,
            Entity::Label(_) => EntityKind::Label,
            Entity::Tracklist(_) => EntityKind::Tracklist,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Track(t) => &t.id,
            Entity::Artist(a) => &a.id,
            Entity::Label(l) => &l.id,
            Entity::Tracklist(tl) => &tl.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Track(t) => &t.name,
            Entity::Artist(a) => &a.name,
            Entity::Label(l) => &l.name,
            Entity::Tracklist(tl) => &tl.name,
        }
    }

    /// Every outgoing reference, paired with the kind of its target.
    pub fn edges(&self) -> Vec<(EntityKind, &str)> {
        fn each(kind: EntityKind, ids: &BTreeSet<String>) -> impl Iterator<Item = (EntityKind, &str)> {
            ids.iter().map(move |id| (kind, id.as_str()))
        }

        use EntityKind::{Artist as A, Label as L, Track as T, Tracklist as TL};

        match self {
            Entity::Track(t) => each(A, &t.artists)
                .chain(each(L, &t.labels))
                .chain(each(TL, &t.tracklists))
                .chain(each(T, &t.remixes))
                .chain(each(T, &t.remix_of))
                .chain(each(T, &t.mashups))
                .chain(each(T, &t.mashup_tracks))
                .collect(),
            Entity::Artist(a) => each(A, &a.members)
                .chain(each(A, &a.part_of))
                .chain(each(A, &a.aliases))
                .chain(each(T, &a.tracks))
                .chain(each(T, &a.mashups))
                .chain(each(T, &a.remixes))
                .chain(each(T, &a.tracks_featured))
                .chain(each(T, &a.tracks_presented))
                .collect(),
            Entity::Label(_) => Vec::new(),
            Entity::Tracklist(tl) => each(T, &tl.tracks).collect(),
        }
    }

    /// Parse a single record line from the log of `kind`.
    pub fn from_record(kind: EntityKind, line: &str) -> serde_json::Result<Self> {
        Ok(match kind {
            EntityKind::Track => Entity::Track(serde_json::from_str(line)?),
            EntityKind::Artist => Entity::Artist(serde_json::from_str(line)?),
            EntityKind::Label => Entity::Label(serde_json::from_str(line)?),
            EntityKind::Tracklist => Entity::Tracklist(serde_json::from_str(line)?),
        })
    }
}

impl From<Track> for Entity {
    fn from(value: Track) -> Self {
        Entity::Track(value)
    }
}

impl From<Artist> for Entity {
    fn from(value: Artist) -> Self {
        Entity::Artist(value)
    }
}

impl From<Label> for Entity {
    fn from(value: Label) -> Self {
        Entity::Label(value)
    }
}

impl From<Tracklist> for Entity {
    fn from(value: Tracklist) -> Self {
        Entity::Tracklist(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_track_edges_target_kinds() {
        let mut track = Track::new("t1", "Song");
        track.artists = ids(&["a1"]);
        track.labels = ids(&["l1"]);
        track.tracklists = ids(&["tl1"]);
        track.remix_of = ids(&["t0"]);

        let entity = Entity::from(track);
        let edges = entity.edges();
        assert!(edges.contains(&(EntityKind::Artist, "a1")));
        assert!(edges.contains(&(EntityKind::Label, "l1")));
        assert!(edges.contains(&(EntityKind::Tracklist, "tl1")));
        assert!(edges.contains(&(EntityKind::Track, "t0")));
        assert_eq!(edges.len(), 4);
    }

    #[test]
    fn test_artist_remixes_are_track_edges() {
        let mut artist = Artist::new("a1", "DJ");
        artist.remixes = ids(&["t9"]);
        artist.aliases = ids(&["a2"]);

        let entity = Entity::from(artist);
        let edges = entity.edges();
        assert_eq!(
            edges,
            vec![(EntityKind::Artist, "a2"), (EntityKind::Track, "t9")]
        );
    }

    #[test]
    fn test_label_has_no_edges() {
        assert!(Entity::from(Label::new("l1", "Label")).edges().is_empty());
    }

    #[test]
    fn test_record_tolerates_missing_optional_fields() {
        let entity = Entity::from_record(EntityKind::Track, r#"{"id":"t1","name":"Song"}"#).unwrap();
        match entity {
            Entity::Track(track) => {
                assert_eq!(track.duration, None);
                assert!(track.medialinks.is_empty());
            }
            other => panic!("unexpected entity {other:?}"),
        }
    }

    #[test]
    fn test_record_is_untagged() {
        let line = serde_json::to_string(&Entity::from(Label::new("l1", "Label"))).unwrap();
        assert_eq!(line, r#"{"id":"l1","name":"Label"}"#);
    }
}
