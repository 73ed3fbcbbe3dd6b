//! In-memory entity caches.
//!
//! Each cache holds the last collection a data source returned together
//! with `loading`/`error` state. Create, update and delete calls go to an
//! [`EntityWriter`] and their results are folded back into the cached
//! list. The aggregation engine only ever sees an owned [`Snapshot`]
//! copied out of these caches.

use crate::models::{Client, Entity, Invoice, Project, Snapshot, Task};
use crate::source::{DataSource, EntityWriter, SourceError};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Cached collection of one entity type.
#[derive(Debug, Clone)]
pub struct EntityCache<T> {
    items: Vec<T>,
    loading: bool,
    error: Option<String>,
}

impl<T> Default for EntityCache<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

impl<T: Entity> EntityCache<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn begin_load(&mut self) {
        self.loading = true;
    }

    /// Replace the cached list with a freshly fetched one.
    pub fn finish_load(&mut self, items: Vec<T>) {
        self.items = items;
        self.settle();
    }

    /// Record a failed call. Cached items are kept.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.error = Some(message.into());
    }

    /// Insert a row through `writer` and cache the stored result.
    pub async fn create(
        &mut self,
        writer: &dyn EntityWriter,
        mut row: Map<String, Value>,
    ) -> Result<T, SourceError> {
        T::prepare_insert(&mut row);
        self.begin_load();

        let result = match writer.insert(T::TABLE, Value::Object(row)).await {
            Ok(stored) => decode_row::<T>(stored),
            Err(e) => Err(e),
        };
        let item = self.settle_call(result)?;
        self.apply_created(item.clone());
        Ok(item)
    }

    /// Apply `changes` to the row with `id` through `writer`.
    pub async fn update(
        &mut self,
        writer: &dyn EntityWriter,
        id: &str,
        changes: Map<String, Value>,
    ) -> Result<T, SourceError> {
        self.begin_load();

        let result = match writer.update(T::TABLE, id, Value::Object(changes)).await {
            Ok(stored) => decode_row::<T>(stored),
            Err(e) => Err(e),
        };
        let item = self.settle_call(result)?;
        if !self.apply_updated(item.clone()) {
            debug!("Updated {} row {} was not cached", T::TABLE, id);
        }
        Ok(item)
    }

    /// Delete the row with `id` through `writer`. Returns whether it was cached.
    pub async fn remove(
        &mut self,
        writer: &dyn EntityWriter,
        id: &str,
    ) -> Result<bool, SourceError> {
        self.begin_load();

        let result = writer.delete(T::TABLE, id).await;
        self.settle_call(result)?;
        Ok(self.apply_removed(id))
    }

    /// Newly created rows go to the front, matching the newest-first fetch order.
    pub fn apply_created(&mut self, item: T) {
        self.items.insert(0, item);
        self.settle();
    }

    /// Swap in the updated row. Returns `false` when the id is not cached.
    pub fn apply_updated(&mut self, item: T) -> bool {
        self.settle();
        match self.items.iter_mut().find(|existing| existing.id() == item.id()) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }

    /// Drop the row with `id`. Returns `false` when nothing was removed.
    pub fn apply_removed(&mut self, id: &str) -> bool {
        self.settle();
        let before = self.items.len();
        self.items.retain(|item| item.id() != id);
        self.items.len() != before
    }

    fn settle_call<R>(&mut self, result: Result<R, SourceError>) -> Result<R, SourceError> {
        result.map_err(|e| {
            warn!("Change to {} failed: {}", T::TABLE, e);
            self.fail(e.to_string());
            e
        })
    }

    fn settle(&mut self) {
        self.loading = false;
        self.error = None;
    }
}

fn decode_row<T: Entity>(row: Value) -> Result<T, SourceError> {
    serde_json::from_value(row).map_err(|source| SourceError::Decode {
        what: format!("{} row", T::TABLE),
        source,
    })
}

/// The four caches a dashboard reads from.
#[derive(Debug, Clone, Default)]
pub struct Store {
    pub projects: EntityCache<Project>,
    pub tasks: EntityCache<Task>,
    pub clients: EntityCache<Client>,
    pub invoices: EntityCache<Invoice>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reload every cache from `source`.
    ///
    /// On failure each cache keeps its previous items and records the
    /// error message; the error is also returned to the caller.
    pub async fn refresh(&mut self, source: &dyn DataSource) -> Result<(), SourceError> {
        self.projects.begin_load();
        self.tasks.begin_load();
        self.clients.begin_load();
        self.invoices.begin_load();

        match source.fetch_snapshot().await {
            Ok(snapshot) => {
                debug!("Refreshed {} entities from {}", snapshot.len(), source.describe());
                self.projects.finish_load(snapshot.projects);
                self.tasks.finish_load(snapshot.tasks);
                self.clients.finish_load(snapshot.clients);
                self.invoices.finish_load(snapshot.invoices);
                Ok(())
            }
            Err(e) => {
                warn!("Refresh from {} failed: {}", source.describe(), e);
                let message = e.to_string();
                self.projects.fail(message.clone());
                self.tasks.fail(message.clone());
                self.clients.fail(message.clone());
                self.invoices.fail(message);
                Err(e)
            }
        }
    }

    /// Owned copy of the current cache contents.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            projects: self.projects.items().to_vec(),
            tasks: self.tasks.items().to_vec(),
            clients: self.clients.items().to_vec(),
            invoices: self.invoices.items().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvoiceStatus, ProjectStatus};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    fn create_test_client(id: &str, name: &str) -> Client {
        serde_json::from_value(json!({"id": id, "name": name})).unwrap()
    }

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    struct FixedSource(Option<Snapshot>);

    #[async_trait]
    impl DataSource for FixedSource {
        async fn fetch_snapshot(&self) -> Result<Snapshot, SourceError> {
            self.0.clone().ok_or_else(|| SourceError::Status {
                table: "clients".to_string(),
                status: 500,
                message: "boom".to_string(),
            })
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    /// Echoes rows back with an id and records what it was sent.
    #[derive(Default)]
    struct RecordingWriter {
        sent: Mutex<Vec<(String, String, Value)>>,
        fail: bool,
    }

    impl RecordingWriter {
        fn record(&self, op: &str, table: &str, row: &Value) -> Result<(), SourceError> {
            self.sent
                .lock()
                .unwrap()
                .push((op.to_string(), table.to_string(), row.clone()));
            if self.fail {
                return Err(SourceError::Status {
                    table: table.to_string(),
                    status: 403,
                    message: "permission denied".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl EntityWriter for RecordingWriter {
        async fn insert(&self, table: &str, row: Value) -> Result<Value, SourceError> {
            self.record("insert", table, &row)?;
            let mut stored = row;
            stored["id"] = json!("new");
            Ok(stored)
        }

        async fn update(
            &self,
            table: &str,
            id: &str,
            changes: Value,
        ) -> Result<Value, SourceError> {
            self.record("update", table, &changes)?;
            let mut stored = changes;
            stored["id"] = json!(id);
            Ok(stored)
        }

        async fn delete(&self, table: &str, id: &str) -> Result<(), SourceError> {
            self.record("delete", table, &json!(id))
        }
    }

    #[test]
    fn test_cache_folding() {
        let mut cache = EntityCache::default();
        cache.finish_load(vec![
            create_test_client("1", "Acme"),
            create_test_client("2", "Globex"),
        ]);

        cache.apply_created(create_test_client("3", "Initech"));
        assert_eq!(cache.items()[0].id, "3");
        assert_eq!(cache.items().len(), 3);

        assert!(cache.apply_updated(create_test_client("2", "Globex Corp")));
        assert_eq!(cache.items()[2].name, "Globex Corp");
        assert!(!cache.apply_updated(create_test_client("9", "Nobody")));
        assert_eq!(cache.items().len(), 3);

        assert!(cache.apply_removed("1"));
        assert!(!cache.apply_removed("1"));
        let ids: Vec<_> = cache.items().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2"]);
    }

    #[test]
    fn test_cache_failure_keeps_items() {
        let mut cache = EntityCache::default();
        cache.finish_load(vec![create_test_client("1", "Acme")]);

        cache.begin_load();
        assert!(cache.loading);
        cache.fail("network down");

        assert!(!cache.loading);
        assert_eq!(cache.error.as_deref(), Some("network down"));
        assert_eq!(cache.items().len(), 1);

        cache.apply_created(create_test_client("2", "Globex"));
        assert_eq!(cache.error, None);
    }

    #[tokio::test]
    async fn test_create_applies_project_defaults() {
        let writer = RecordingWriter::default();
        let mut cache: EntityCache<Project> = EntityCache::default();

        let project = cache
            .create(&writer, fields(json!({"name": "Website", "completion_percentage": 55})))
            .await
            .unwrap();

        assert_eq!(project.id, "new");
        assert_eq!(project.status, ProjectStatus::InProgress);
        assert_eq!(project.completion_percentage, 0);
        assert_eq!(cache.items()[0].name, "Website");

        let sent = writer.sent.lock().unwrap();
        assert_eq!(sent[0].0, "insert");
        assert_eq!(sent[0].1, "projects");
        assert_eq!(sent[0].2["status"], "In Progress");
    }

    #[tokio::test]
    async fn test_update_and_remove_through_writer() {
        let writer = RecordingWriter::default();
        let mut cache = EntityCache::default();
        cache.finish_load(vec![
            create_test_client("1", "Acme"),
            create_test_client("2", "Globex"),
        ]);

        let updated = cache
            .update(&writer, "2", fields(json!({"name": "Globex Corp"})))
            .await
            .unwrap();
        assert_eq!(updated.name, "Globex Corp");
        assert_eq!(cache.items()[1].name, "Globex Corp");

        assert!(cache.remove(&writer, "1").await.unwrap());
        assert!(!cache.remove(&writer, "1").await.unwrap());
        assert_eq!(cache.items().len(), 1);

        let sent = writer.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1], ("delete".to_string(), "clients".to_string(), json!("1")));
    }

    #[tokio::test]
    async fn test_failed_change_records_error() {
        let writer = RecordingWriter {
            fail: true,
            ..RecordingWriter::default()
        };
        let mut cache = EntityCache::default();
        cache.finish_load(vec![create_test_client("1", "Acme")]);

        let err = cache.remove(&writer, "1").await.unwrap_err();
        assert!(err.to_string().contains("permission denied"));
        assert!(!cache.loading);
        assert!(cache.error.as_deref().unwrap().contains("HTTP 403"));
        assert_eq!(cache.items().len(), 1);

        assert!(cache
            .create(&writer, fields(json!({"name": "Globex"})))
            .await
            .is_err());
        assert_eq!(cache.items().len(), 1);
    }

    #[tokio::test]
    async fn test_store_refresh() {
        let snapshot: Snapshot = serde_json::from_value(json!({
            "clients": [{"id": 1, "name": "Acme"}],
            "invoices": [{"id": 1, "amount": 10, "status": "Paid"}]
        }))
        .unwrap();

        let mut store = Store::new();
        store.refresh(&FixedSource(Some(snapshot))).await.unwrap();
        assert!(!store.clients.loading);
        assert_eq!(store.clients.items().len(), 1);
        assert_eq!(store.snapshot().invoices[0].status, InvoiceStatus::Paid);

        let err = store.refresh(&FixedSource(None)).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(!store.tasks.loading);
        assert!(store.tasks.error.as_deref().unwrap().contains("HTTP 500"));
        assert_eq!(store.snapshot().clients.len(), 1);
    }
}
