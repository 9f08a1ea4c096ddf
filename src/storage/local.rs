//! Local filesystem storage implementation.
//!
//! Each kind has its own append-only JSON Lines log. Every append is a single
//! newline-terminated write, so a crash leaves a prefix of whole records
//! followed by at most one torn record, which is cut off on the next resume.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::{AppError, Result};
use crate::models::{Entity, EntityKind, PerKind};
use crate::storage::{EntityStore, StoreMode};

/// Local filesystem storage backend.
pub struct LocalStore {
    index: PerKind<HashSet<String>>,
    logs: PerKind<File>,
}

/// The only part of a record replay needs.
#[derive(Deserialize)]
struct RecordId {
    id: String,
}

impl LocalStore {
    /// Open the store rooted at the given directory, creating it if needed.
    pub async fn open(root_dir: impl Into<PathBuf>, mode: StoreMode) -> Result<Self> {
        let root_dir = root_dir.into();
        tokio::fs::create_dir_all(&root_dir).await?;

        let mut index: PerKind<HashSet<String>> = PerKind::default();
        if mode == StoreMode::Resume {
            for kind in EntityKind::ALL {
                let path = Self::log_path(&root_dir, kind);
                *index.get_mut(kind) = recover_log(&path).await?;
                log::debug!("Loaded {} {}", index.get(kind).len(), kind.plural());
            }
        }

        let logs = PerKind {
            tracks: open_log(&Self::log_path(&root_dir, EntityKind::Track), mode).await?,
            artists: open_log(&Self::log_path(&root_dir, EntityKind::Artist), mode).await?,
            labels: open_log(&Self::log_path(&root_dir, EntityKind::Label), mode).await?,
            tracklists: open_log(&Self::log_path(&root_dir, EntityKind::Tracklist), mode)
                .await?,
        };

        Ok(Self { index, logs })
    }

    /// Location of the record log for `kind`.
    pub fn log_path(root_dir: &Path, kind: EntityKind) -> PathBuf {
        root_dir.join(format!("{}.jsonl", kind.plural()))
    }
}

#[async_trait]
impl EntityStore for LocalStore {
    fn exists(&self, kind: EntityKind, id: &str) -> bool {
        self.index.get(kind).contains(id)
    }

    async fn append(&mut self, entity: &Entity) -> Result<()> {
        let kind = entity.kind();
        if self.exists(kind, entity.id()) {
            return Err(AppError::duplicate(kind, entity.id()));
        }

        let mut line = serde_json::to_string(entity)?;
        line.push('\n');

        // One write call per record; O_APPEND keeps it in one piece.
        let file = self.logs.get_mut(kind);
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        self.index.get_mut(kind).insert(entity.id().to_string());
        Ok(())
    }

    fn known_count(&self, kind: EntityKind) -> usize {
        self.index.get(kind).len()
    }
}

/// Open a log for appending. Fresh mode truncates it first.
async fn open_log(path: &Path, mode: StoreMode) -> Result<File> {
    if mode == StoreMode::Fresh {
        File::create(path).await?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    Ok(file)
}

/// Rebuild the id index of a log, cutting off a torn tail if there is one.
///
/// A malformed record followed by valid records means the log is not a
/// prefix of whole records, and is reported as corrupt.
async fn recover_log(path: &Path) -> Result<HashSet<String>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(AppError::Io(e)),
    };

    let mut ids = HashSet::new();
    let mut valid_end = 0usize;
    let mut first_bad: Option<(usize, String)> = None;
    let mut offset = 0usize;
    let mut line_no = 0usize;

    while offset < bytes.len() {
        line_no += 1;
        let rest = &bytes[offset..];
        let Some(newline) = rest.iter().position(|b| *b == b'\n') else {
            // Unterminated tail: the write never completed.
            if first_bad.is_none() {
                first_bad = Some((line_no, "record is not newline-terminated".to_string()));
            }
            break;
        };
        let line = &rest[..newline];
        offset += newline + 1;

        if line.iter().all(u8::is_ascii_whitespace) {
            if first_bad.is_none() {
                valid_end = offset;
            }
            continue;
        }

        match serde_json::from_slice::<RecordId>(line) {
            Ok(record) => {
                if let Some((bad_line, message)) = first_bad.take() {
                    return Err(AppError::corrupt(path, bad_line, message));
                }
                ids.insert(record.id);
                valid_end = offset;
            }
            Err(e) => {
                if first_bad.is_none() {
                    first_bad = Some((line_no, e.to_string()));
                }
            }
        }
    }

    if let Some((bad_line, message)) = first_bad {
        log::warn!(
            "Truncating torn record at {} line {} ({}): dropping {} bytes",
            path.display(),
            bad_line,
            message,
            bytes.len() - valid_end
        );
        let file = OpenOptions::new().write(true).open(path).await?;
        file.set_len(valid_end as u64).await?;
        file.sync_all().await?;
    }

    Ok(ids)
}

/// Sequential reader over one record log.
///
/// A missing log reads as empty, and an unterminated final line is ignored
/// like a torn write.
pub struct RecordReader {
    path: PathBuf,
    kind: EntityKind,
    reader: Option<BufReader<File>>,
    line: String,
    line_no: usize,
}

impl RecordReader {
    pub async fn open(path: &Path, kind: EntityKind) -> Result<Self> {
        let reader = match File::open(path).await {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(AppError::Io(e)),
        };
        Ok(Self {
            path: path.to_path_buf(),
            kind,
            reader,
            line: String::new(),
            line_no: 0,
        })
    }

    /// The next record in file order, or `None` at the end of the log.
    pub async fn next_record(&mut self) -> Result<Option<Entity>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        loop {
            self.line.clear();
            if reader.read_line(&mut self.line).await? == 0 {
                self.reader = None;
                return Ok(None);
            }
            self.line_no += 1;

            if !self.line.ends_with('\n') {
                log::warn!(
                    "Ignoring unterminated record at {} line {}",
                    self.path.display(),
                    self.line_no
                );
                self.reader = None;
                return Ok(None);
            }
            if self.line.trim().is_empty() {
                continue;
            }

            let entity = Entity::from_record(self.kind, self.line.trim_end())
                .map_err(|e| AppError::corrupt(&self.path, self.line_no, e))?;
            return Ok(Some(entity));
        }
    }
}

/// Stream every record of a log through `f`, in file order.
///
/// Returns the number of records read.
pub async fn for_each_record(
    path: &Path,
    kind: EntityKind,
    mut f: impl FnMut(Entity) -> Result<()>,
) -> Result<usize> {
    let mut reader = RecordReader::open(path, kind).await?;
    let mut count = 0usize;
    while let Some(entity) = reader.next_record().await? {
        f(entity)?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Label, Track, Tracklist};
    use tempfile::TempDir;

    fn track(id: &str) -> Entity {
        Entity::from(Track::new(id, format!("Track {id}")))
    }

    #[tokio::test]
    async fn test_append_and_exists() {
        let tmp = TempDir::new().unwrap();
        let mut store = LocalStore::open(tmp.path(), StoreMode::Fresh).await.unwrap();

        store.append(&track("t1")).await.unwrap();
        assert!(store.exists(EntityKind::Track, "t1"));
        assert!(!store.exists(EntityKind::Artist, "t1"));
        assert_eq!(store.known_count(EntityKind::Track), 1);
    }

    #[tokio::test]
    async fn test_resume_replays_index() {
        let tmp = TempDir::new().unwrap();
        {
            let mut store = LocalStore::open(tmp.path(), StoreMode::Fresh).await.unwrap();
            store.append(&track("t1")).await.unwrap();
            store
                .append(&Entity::from(Label::new("l1", "Label")))
                .await
                .unwrap();
        }

        let store = LocalStore::open(tmp.path(), StoreMode::Resume).await.unwrap();
        assert!(store.exists(EntityKind::Track, "t1"));
        assert!(store.exists(EntityKind::Label, "l1"));
        assert_eq!(store.known_count(EntityKind::Tracklist), 0);
    }

    #[tokio::test]
    async fn test_fresh_truncates_logs() {
        let tmp = TempDir::new().unwrap();
        {
            let mut store = LocalStore::open(tmp.path(), StoreMode::Fresh).await.unwrap();
            store.append(&track("t1")).await.unwrap();
        }

        let store = LocalStore::open(tmp.path(), StoreMode::Fresh).await.unwrap();
        assert!(!store.exists(EntityKind::Track, "t1"));
        let path = LocalStore::log_path(tmp.path(), EntityKind::Track);
        assert_eq!(tokio::fs::read(&path).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_append_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut store = LocalStore::open(tmp.path(), StoreMode::Fresh).await.unwrap();

        store.append(&track("t1")).await.unwrap();
        let err = store.append(&track("t1")).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateEntity { .. }));

        let path = LocalStore::log_path(tmp.path(), EntityKind::Track);
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_torn_tail_is_truncated_on_resume() {
        let tmp = TempDir::new().unwrap();
        let path = LocalStore::log_path(tmp.path(), EntityKind::Track);
        tokio::fs::write(&path, "{\"id\":\"t1\",\"name\":\"A\"}\n{\"id\":\"t2\",\"na")
            .await
            .unwrap();

        let mut store = LocalStore::open(tmp.path(), StoreMode::Resume).await.unwrap();
        assert!(store.exists(EntityKind::Track, "t1"));
        assert!(!store.exists(EntityKind::Track, "t2"));

        store.append(&track("t2")).await.unwrap();
        drop(store);

        let mut seen = Vec::new();
        let count = for_each_record(&path, EntityKind::Track, |e| {
            seen.push(e.id().to_string());
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(count, 2);
        assert_eq!(seen, vec!["t1".to_string(), "t2".to_string()]);
    }

    #[tokio::test]
    async fn test_corruption_before_valid_records_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = LocalStore::log_path(tmp.path(), EntityKind::Tracklist);
        tokio::fs::write(&path, "garbage\n{\"id\":\"tl1\",\"name\":\"Set\"}\n")
            .await
            .unwrap();

        let result = LocalStore::open(tmp.path(), StoreMode::Resume).await;
        assert!(matches!(
            result,
            Err(AppError::CorruptRecord { line: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_for_each_record_reads_typed_entities() {
        let tmp = TempDir::new().unwrap();
        let mut store = LocalStore::open(tmp.path(), StoreMode::Fresh).await.unwrap();
        let mut tracklist = Tracklist::new("tl1", "Live Set");
        tracklist.tracks.insert("t1".to_string());
        store.append(&Entity::from(tracklist.clone())).await.unwrap();

        let path = LocalStore::log_path(tmp.path(), EntityKind::Tracklist);
        let mut read = Vec::new();
        for_each_record(&path, EntityKind::Tracklist, |e| {
            read.push(e);
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(read, vec![Entity::from(tracklist)]);
    }

    #[tokio::test]
    async fn test_for_each_record_missing_log_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = LocalStore::log_path(tmp.path(), EntityKind::Label);
        let count = for_each_record(&path, EntityKind::Label, |_| Ok(()))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_record_reader_yields_records_one_at_a_time() {
        let tmp = TempDir::new().unwrap();
        let path = LocalStore::log_path(tmp.path(), EntityKind::Label);
        tokio::fs::write(
            &path,
            "{\"id\":\"l1\",\"name\":\"A\"}\n\n{\"id\":\"l2\",\"name\":\"B\"}\n{\"id\":\"l3\"",
        )
        .await
        .unwrap();

        let mut reader = RecordReader::open(&path, EntityKind::Label).await.unwrap();
        let first = reader.next_record().await.unwrap().unwrap();
        assert_eq!(first, Entity::from(Label::new("l1", "A")));
        let second = reader.next_record().await.unwrap().unwrap();
        assert_eq!(second.id(), "l2");
        assert!(reader.next_record().await.unwrap().is_none());
        assert!(reader.next_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_reader_reports_bad_line() {
        let tmp = TempDir::new().unwrap();
        let path = LocalStore::log_path(tmp.path(), EntityKind::Label);
        tokio::fs::write(&path, "{\"id\":\"l1\",\"name\":\"A\"}\nnot json\n")
            .await
            .unwrap();

        let mut reader = RecordReader::open(&path, EntityKind::Label).await.unwrap();
        assert!(reader.next_record().await.unwrap().is_some());
        assert!(matches!(
            reader.next_record().await,
            Err(AppError::CorruptRecord { line: 2, .. })
        ));
    }
}
