//! On-disk cache: `snapshot.json` holds the full aggregate and `metadata.json`
//! a few counts derived from it.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::{debug, warn};

use crate::data::{CacheSnapshot, UpdateMetadata};
use crate::error::RefreshError;

pub const SNAPSHOT_FILE: &str = "snapshot.json";
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Replace both cache files with `snapshot` and its metadata.
    ///
    /// Both files are fully written to temporaries before either is renamed
    /// into place, so a failure part-way leaves the previous pair untouched.
    pub async fn persist(&self, snapshot: &CacheSnapshot) -> Result<UpdateMetadata, RefreshError> {
        let metadata = snapshot.metadata();
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| persist_error(&self.dir, source))?;

        let snapshot_tmp = self.write_temp(SNAPSHOT_FILE, snapshot).await?;
        let metadata_tmp = match self.write_temp(METADATA_FILE, &metadata).await {
            Ok(path) => path,
            Err(err) => {
                let _ = fs::remove_file(&snapshot_tmp).await;
                return Err(err);
            }
        };

        let snapshot_path = self.snapshot_path();
        fs::rename(&snapshot_tmp, &snapshot_path)
            .await
            .map_err(|source| persist_error(&snapshot_path, source))?;
        let metadata_path = self.metadata_path();
        fs::rename(&metadata_tmp, &metadata_path)
            .await
            .map_err(|source| persist_error(&metadata_path, source))?;

        debug!(dir = %self.dir.display(), "cache written");
        Ok(metadata)
    }

    async fn write_temp<T: Serialize>(&self, file: &str, value: &T) -> Result<PathBuf, RefreshError> {
        let path = self.dir.join(format!(".{file}.tmp"));
        let mut json = serde_json::to_string_pretty(value)
            .map_err(|err| persist_error(&path, std::io::Error::other(err)))?;
        json.push('\n');

        let file = fs::File::create(&path)
            .await
            .map_err(|source| persist_error(&path, source))?;
        write_and_sync(file, json.as_bytes())
            .await
            .map_err(|source| persist_error(&path, source))?;
        Ok(path)
    }

    /// The last persisted snapshot; `None` if missing or unreadable
    pub async fn load_snapshot(&self) -> Option<CacheSnapshot> {
        read_json(&self.snapshot_path()).await
    }

    /// The last persisted metadata; `None` if missing or unreadable
    pub async fn load_metadata(&self) -> Option<UpdateMetadata> {
        read_json(&self.metadata_path()).await
    }
}

async fn write_and_sync(mut file: fs::File, bytes: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt as _;
    file.write_all(bytes).await?;
    file.sync_all().await
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no cache file yet");
            return None;
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read cache file");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring malformed cache file");
            None
        }
    }
}

fn persist_error(path: &Path, source: std::io::Error) -> RefreshError {
    RefreshError::Persist {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        ActionType, ActionableComment, Comment, CommentKind, PullRequestSummary,
        RepositorySummary, Severity, SeverityCounts,
    };
    use tempfile::tempdir;

    fn sample_snapshot() -> CacheSnapshot {
        let comment = ActionableComment {
            comment: Comment {
                id: 42,
                kind: CommentKind::ReviewComment,
                author: "reviewer".to_owned(),
                body: "This will deadlock under load".to_owned(),
                created_at: "2026-10-10T08:30:00Z".parse().unwrap(),
                path: Some("src/lib.rs".to_owned()),
                line: Some(17),
                url: "https://github.com/acme/widgets/pull/5#discussion_r42".to_owned(),
            },
            action_type: ActionType::FixRequired,
            severity: Severity::High,
        };
        CacheSnapshot::new(
            "2026-10-18T09:00:00Z".parse().unwrap(),
            vec![RepositorySummary {
                owner: "acme".to_owned(),
                name: "widgets".to_owned(),
                url: "https://github.com/acme/widgets".to_owned(),
                last_push: "2026-10-17T22:00:00Z".parse().unwrap(),
                pull_requests: vec![PullRequestSummary {
                    number: 5,
                    title: "Add pooling".to_owned(),
                    author: "dev".to_owned(),
                    created_at: "2026-10-09T10:00:00Z".parse().unwrap(),
                    url: "https://github.com/acme/widgets/pull/5".to_owned(),
                    actionable_comments: vec![comment],
                    actionable_count: 1,
                    severity_counts: SeverityCounts { high: 1, medium: 0, low: 0 },
                }],
            }],
        )
    }

    #[tokio::test]
    async fn test_persist_then_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let snapshot = sample_snapshot();

        let metadata = store.persist(&snapshot).await.unwrap();

        assert_eq!(store.load_snapshot().await, Some(snapshot.clone()));
        assert_eq!(store.load_metadata().await, Some(metadata));
        assert_eq!(metadata.repository_count, 1);
        assert_eq!(metadata.total_prs, 1);
        assert_eq!(metadata.total_actionable_comments, 1);
        assert_eq!(metadata.last_update, snapshot.last_update);
    }

    #[tokio::test]
    async fn test_persist_creates_directory_and_leaves_no_temporaries() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("nested").join("cache"));
        store.persist(&sample_snapshot()).await.unwrap();

        let mut names: Vec<String> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![METADATA_FILE, SNAPSHOT_FILE]);
    }

    #[tokio::test]
    async fn test_persist_overwrites_previous_snapshot() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        store.persist(&sample_snapshot()).await.unwrap();

        let empty = CacheSnapshot::new("2026-10-18T12:00:00Z".parse().unwrap(), vec![]);
        store.persist(&empty).await.unwrap();

        assert_eq!(store.load_snapshot().await, Some(empty));
        assert_eq!(store.load_metadata().await.unwrap().repository_count, 0);
    }

    #[tokio::test]
    async fn test_missing_files_load_as_none() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        assert!(store.load_snapshot().await.is_none());
        assert!(store.load_metadata().await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_files_load_as_none() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        std::fs::write(store.snapshot_path(), "{\"lastUpdate\": ").unwrap();
        std::fs::write(store.metadata_path(), "[]").unwrap();
        assert!(store.load_snapshot().await.is_none());
        assert!(store.load_metadata().await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_without_version_loads() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        std::fs::write(
            store.snapshot_path(),
            r#"{"lastUpdate":"2026-10-18T09:00:00Z","repositories":[]}"#,
        )
        .unwrap();
        let snapshot = store.load_snapshot().await.unwrap();
        assert_eq!(snapshot.version, crate::data::SNAPSHOT_VERSION);
    }
}
