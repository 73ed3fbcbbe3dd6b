//! Data-access collaborators.
//!
//! A [`DataSource`] produces the entity snapshot the dashboard aggregates.
//! Sources report failures as [`SourceError`] and never retry; deciding
//! whether to try again is left to the caller.
//!
//! Writes go through an [`EntityWriter`]. Only the hosted backend accepts
//! them; snapshot files are read-only.

pub mod snapshot_file;
pub mod supabase;

use crate::config::SourceConfig;
use crate::models::Snapshot;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

pub use snapshot_file::SnapshotFile;
pub use supabase::{SupabaseConfig, SupabaseSource};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read snapshot {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request for {table} timed out after {seconds}s")]
    Timeout { table: String, seconds: u64 },

    #[error("Request for {table} failed: {source}")]
    Http {
        table: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Fetching {table} returned HTTP {status}: {message}")]
    Status {
        table: String,
        status: u16,
        message: String,
    },

    #[error("Backend returned no {table} row")]
    EmptyResponse { table: String },

    #[error("No {table} row with id {id}")]
    NotFound { table: String, id: String },

    #[error("No data source configured: {0}")]
    NotConfigured(String),
}

/// Something that can hand over a fresh entity snapshot.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch every collection the dashboard reads.
    async fn fetch_snapshot(&self) -> Result<Snapshot, SourceError>;

    /// Short description for logs and progress messages.
    fn describe(&self) -> String;

    /// Whether fetching involves the network.
    fn is_remote(&self) -> bool {
        false
    }
}

/// Create, update and delete rows of a table.
///
/// Rows travel as JSON objects; the caller decodes the returned
/// representation into its entity type.
#[async_trait]
pub trait EntityWriter: Send + Sync {
    /// Insert `row` and return the stored row.
    async fn insert(&self, table: &str, row: Value) -> Result<Value, SourceError>;

    /// Apply `changes` to the row with `id` and return the stored row.
    async fn update(&self, table: &str, id: &str, changes: Value) -> Result<Value, SourceError>;

    /// Delete the row with `id`.
    async fn delete(&self, table: &str, id: &str) -> Result<(), SourceError>;
}

/// Pick a data source from configuration.
///
/// A local snapshot file wins over a hosted backend when both are set.
pub fn from_config(config: &SourceConfig) -> Result<Box<dyn DataSource>, SourceError> {
    if let Some(ref path) = config.snapshot {
        return Ok(Box::new(SnapshotFile::new(path)));
    }

    if config.supabase_url.is_none() {
        return Err(SourceError::NotConfigured(
            "pass --snapshot FILE or --supabase-url URL".to_string(),
        ));
    }
    Ok(Box::new(supabase_from_config(config)?))
}

/// Build the hosted backend for writes. A snapshot file is ignored here.
pub fn writer_from_config(config: &SourceConfig) -> Result<SupabaseSource, SourceError> {
    if config.supabase_url.is_none() {
        return Err(SourceError::NotConfigured(
            "changes need a Supabase backend (pass --supabase-url URL)".to_string(),
        ));
    }
    supabase_from_config(config)
}

fn supabase_from_config(config: &SourceConfig) -> Result<SupabaseSource, SourceError> {
    match (&config.supabase_url, &config.supabase_key) {
        (Some(url), Some(key)) => SupabaseSource::new(SupabaseConfig {
            url: url.clone(),
            api_key: key.clone(),
            access_token: config.access_token.clone(),
            timeout_seconds: config.timeout_seconds,
        }),
        (Some(_), None) => Err(SourceError::NotConfigured(
            "a Supabase URL was given without an API key (set SUPABASE_ANON_KEY)".to_string(),
        )),
        (None, _) => Err(SourceError::NotConfigured(
            "no Supabase URL configured".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_prefers_snapshot() {
        let config = SourceConfig {
            snapshot: Some(PathBuf::from("data.json")),
            supabase_url: Some("https://example.supabase.co".to_string()),
            supabase_key: Some("anon".to_string()),
            ..SourceConfig::default()
        };
        let source = from_config(&config).unwrap();
        assert!(!source.is_remote());
        assert!(source.describe().contains("data.json"));
    }

    #[test]
    fn test_from_config_supabase() {
        let config = SourceConfig {
            supabase_url: Some("https://example.supabase.co/".to_string()),
            supabase_key: Some("anon".to_string()),
            ..SourceConfig::default()
        };
        let source = from_config(&config).unwrap();
        assert!(source.is_remote());
        assert_eq!(source.describe(), "Supabase at https://example.supabase.co");
    }

    #[test]
    fn test_from_config_missing() {
        let err = from_config(&SourceConfig::default()).err().unwrap();
        assert!(matches!(err, SourceError::NotConfigured(_)));

        let config = SourceConfig {
            supabase_url: Some("https://example.supabase.co".to_string()),
            ..SourceConfig::default()
        };
        let err = from_config(&config).err().unwrap();
        assert!(err.to_string().contains("SUPABASE_ANON_KEY"));
    }

    #[test]
    fn test_writer_needs_supabase() {
        let config = SourceConfig {
            snapshot: Some(PathBuf::from("data.json")),
            ..SourceConfig::default()
        };
        let err = writer_from_config(&config).err().unwrap();
        assert!(matches!(err, SourceError::NotConfigured(_)));

        let config = SourceConfig {
            snapshot: Some(PathBuf::from("data.json")),
            supabase_url: Some("https://example.supabase.co".to_string()),
            supabase_key: Some("anon".to_string()),
            ..SourceConfig::default()
        };
        let writer = writer_from_config(&config).unwrap();
        assert_eq!(writer.describe(), "Supabase at https://example.supabase.co");
    }
}
