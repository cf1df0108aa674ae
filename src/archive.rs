//! JSON snapshot archive.
//!
//! Layout: `<root>/<endpoint>/<YYYY-MM-DD_HH-MM-SS-mmm>-<seq>.json` per write
//! plus a `latest.json` that accumulates fields across writes. The fixed-width
//! sequence keeps same-millisecond snapshots in name order.

use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const LATEST: &str = "latest.json";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid archive endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("archive io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive json error: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ArchiveError + '_ {
    move |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Shallow merge: non-null fields of `update` win, everything else keeps the
/// value from `previous`.
pub fn merge_latest(previous: Option<Value>, update: &Value) -> Value {
    let mut merged = match previous {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    match update {
        Value::Object(fields) => {
            for (k, v) in fields {
                if !v.is_null() {
                    merged.insert(k.clone(), v.clone());
                }
            }
            Value::Object(merged)
        }
        other => other.clone(),
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotArchive {
    root: PathBuf,
    // One writer per endpoint: naming and the latest.json merge are read-modify-write.
    writers: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SnapshotArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            writers: Arc::default(),
        }
    }

    fn writer(&self, endpoint: &str) -> Arc<Mutex<()>> {
        let mut map = self.writers.lock().unwrap_or_else(|p| p.into_inner());
        map.entry(endpoint.to_string()).or_default().clone()
    }

    fn endpoint_dir(&self, endpoint: &str) -> Result<PathBuf, ArchiveError> {
        let valid = !endpoint.is_empty()
            && endpoint
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ArchiveError::InvalidEndpoint(endpoint.to_string()));
        }
        Ok(self.root.join(endpoint))
    }

    /// Writes a timestamped snapshot and folds it into `latest.json`.
    pub async fn save(&self, endpoint: &str, value: &Value) -> Result<PathBuf, ArchiveError> {
        let dir = self.endpoint_dir(endpoint)?;
        let writer = self.writer(endpoint);
        let _guard = writer.lock().await;
        tokio::fs::create_dir_all(&dir).await.map_err(io_err(&dir))?;

        let now = Utc::now();
        let mut snapshot = match value {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert("data".into(), other.clone());
                map
            }
        };
        snapshot.insert("timestamp".into(), Value::String(now.to_rfc3339()));
        let snapshot = Value::Object(snapshot);

        let stem = now.format("%Y-%m-%d_%H-%M-%S-%3f").to_string();
        let mut seq = 0u32;
        let mut path = dir.join(format!("{stem}-{seq:03}.json"));
        while tokio::fs::try_exists(&path).await.map_err(io_err(&path))? {
            seq += 1;
            path = dir.join(format!("{stem}-{seq:03}.json"));
        }
        let body = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(&path, body).await.map_err(io_err(&path))?;

        let previous = self.latest(endpoint).await.unwrap_or_else(|e| {
            warn!(endpoint, error = %e, "unreadable latest.json, starting over");
            None
        });
        let merged = merge_latest(previous, &snapshot);
        let latest_path = dir.join(LATEST);
        let tmp = dir.join(format!(".latest.{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&merged)?)
            .await
            .map_err(io_err(&tmp))?;
        tokio::fs::rename(&tmp, &latest_path)
            .await
            .map_err(io_err(&latest_path))?;

        debug!(endpoint, path = %path.display(), "snapshot saved");
        Ok(path)
    }

    pub async fn latest(&self, endpoint: &str) -> Result<Option<Value>, ArchiveError> {
        let path = self.endpoint_dir(endpoint)?.join(LATEST);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    /// Snapshots newest-first, at most `limit`. Unreadable files are skipped.
    pub async fn history(&self, endpoint: &str, limit: usize) -> Result<Vec<Value>, ArchiveError> {
        let dir = self.endpoint_dir(endpoint)?;
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(r) => r,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&dir)(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(io_err(&dir))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") && name != LATEST && !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort_unstable_by(|a, b| b.cmp(a));

        let mut out = Vec::new();
        for name in names.into_iter().take(limit) {
            let path = dir.join(&name);
            let parsed = match tokio::fs::read(&path).await {
                Ok(bytes) => serde_json::from_slice::<Value>(&bytes).map_err(ArchiveError::from),
                Err(e) => Err(io_err(&path)(e)),
            };
            match parsed {
                Ok(v) => out.push(v),
                Err(e) => warn!(file = %name, error = %e, "skipping unreadable snapshot"),
            }
        }
        Ok(out)
    }
}
