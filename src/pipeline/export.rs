// src/pipeline/export.rs

//! Turtle export of the entity logs.
//!
//! Reads each log once, in whatever order the records were appended, and
//! writes one subject block per entity as soon as its record is read.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

use crate::error::Result;
use crate::models::{Entity, EntityKind, ExportConfig, MediaLink, PerKind};
use crate::storage::LocalStore;
use crate::storage::local::RecordReader;
use crate::utils::resolve_url;

const FOAF: &str = "http://xmlns.com/foaf/0.1/";

/// Where the export went and how many records it covered.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub output: PathBuf,
    pub records: PerKind<usize>,
}

/// Renders entities as Turtle statements.
pub struct TurtleWriter {
    base: Url,
    prefix: String,
}

impl TurtleWriter {
    pub fn new(config: &ExportConfig) -> Result<Self> {
        let mut base = config.base_iri.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            base: Url::parse(&base)?,
            prefix: config.prefix.clone(),
        })
    }

    pub fn header(&self) -> String {
        format!(
            "@prefix foaf: <{FOAF}> .\n@prefix {}: <{}> .\n\n",
            self.prefix, self.base
        )
    }

    fn iri(&self, kind: EntityKind, id: &str) -> String {
        format!("<{}>", resolve_url(&self.base, &format!("{kind}/{id}")))
    }

    fn pred(&self, name: &str) -> String {
        format!("{}:{}", self.prefix, name)
    }

    /// One subject block, terminated by a blank line.
    pub fn entity(&self, entity: &Entity) -> String {
        let mut statements: Vec<(String, String)> =
            vec![("foaf:name".to_string(), literal(entity.name()))];

        let mut links = |pred: String, kind: EntityKind, ids: &BTreeSet<String>| {
            for id in ids {
                statements.push((pred.clone(), self.iri(kind, id)));
            }
        };

        match entity {
            Entity::Artist(a) => {
                links("foaf:member".to_string(), EntityKind::Artist, &a.members);
                links(self.pred("partOf"), EntityKind::Artist, &a.part_of);
                links(self.pred("alias"), EntityKind::Artist, &a.aliases);
            }
            Entity::Label(_) => {}
            Entity::Track(t) => {
                links(self.pred("artist"), EntityKind::Artist, &t.artists);
                links(self.pred("label"), EntityKind::Label, &t.labels);
                links(self.pred("tracklist"), EntityKind::Tracklist, &t.tracklists);
                links(self.pred("remix"), EntityKind::Track, &t.remixes);
                links(self.pred("remix_of"), EntityKind::Track, &t.remix_of);
                links(self.pred("mashup"), EntityKind::Track, &t.mashups);
                links(self.pred("mashup_source"), EntityKind::Track, &t.mashup_tracks);
                if let Some(duration) = &t.duration {
                    statements.push((self.pred("duration"), literal(duration)));
                }
                for link in &t.medialinks {
                    statements.push((self.media_pred(link), literal(&link.url())));
                }
            }
            Entity::Tracklist(tl) => {
                links(self.pred("track"), EntityKind::Track, &tl.tracks);
            }
        }

        let body = statements
            .iter()
            .map(|(pred, object)| format!("{pred} {object}"))
            .collect::<Vec<_>>()
            .join(" ;\n    ");
        format!("{} {} .\n\n", self.iri(entity.kind(), entity.id()), body)
    }

    fn media_pred(&self, link: &MediaLink) -> String {
        self.pred(&format!("{}_link", link.provider()))
    }
}

/// Quote and escape a string literal.
fn literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Export every log under `storage_dir` to `output`.
pub async fn run_export(
    config: &ExportConfig,
    storage_dir: &Path,
    output: &Path,
) -> Result<ExportSummary> {
    let writer = TurtleWriter::new(config)?;

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut out = BufWriter::new(tokio::fs::File::create(output).await?);
    out.write_all(writer.header().as_bytes()).await?;

    let mut records = PerKind::<usize>::default();
    for kind in [
        EntityKind::Artist,
        EntityKind::Label,
        EntityKind::Track,
        EntityKind::Tracklist,
    ] {
        let path = LocalStore::log_path(storage_dir, kind);
        let mut reader = RecordReader::open(&path, kind).await?;
        let mut count = 0usize;
        while let Some(entity) = reader.next_record().await? {
            out.write_all(writer.entity(&entity).as_bytes()).await?;
            count += 1;
        }

        log::info!("Exported {} {}", count, kind.plural());
        *records.get_mut(kind) = count;
    }

    out.flush().await?;
    Ok(ExportSummary {
        output: output.to_path_buf(),
        records,
    })
}
