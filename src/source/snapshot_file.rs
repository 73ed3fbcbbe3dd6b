//! Snapshot documents on local disk.
//!
//! The document is a JSON object with optional `projects`, `tasks`,
//! `clients` and `invoices` arrays, shaped like the backend's rows.

use super::{DataSource, SourceError};
use crate::models::Snapshot;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Reads a snapshot from a JSON file on every fetch.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for SnapshotFile {
    async fn fetch_snapshot(&self) -> Result<Snapshot, SourceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;

        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|source| SourceError::Decode {
                what: self.path.display().to_string(),
                source,
            })?;

        debug!(
            "Loaded {} entities from {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        format!("snapshot file {}", self.path.display())
    }
}
