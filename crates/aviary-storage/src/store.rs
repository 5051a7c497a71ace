//! Collection/document store backed by the SQLite `documents` table.
//!
//! Every write re-runs the queries of the subscriptions watching the
//! affected collections and publishes the new result through a
//! `tokio::sync::watch` channel. A subscription ends when its receiver is
//! dropped; closed channels are pruned on the next write.

use std::sync::{Arc, Mutex};

use rusqlite::types::Value as SqlValue;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use aviary_core::error::{AviaryError, Result};

use crate::db::Database;
use crate::document::{Direction, Document, Fields, Query};

/// Storage API shared by the server and the in-process client components.
pub trait DocumentStore: Send + Sync {
    /// Insert a document under a freshly generated id.
    fn add(&self, collection: &str, fields: Fields) -> Result<Document>;

    /// Create or replace the document with the given id.
    fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Delete a document and every collection nested under it.
    ///
    /// Returns `false` when the document did not exist.
    fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    /// Delete every document in `collection` and below it. Returns the
    /// number of documents removed.
    fn delete_collection(&self, collection: &str) -> Result<usize>;

    fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>>;

    /// Subscribe to the result of `query` on `collection`.
    ///
    /// The receiver starts with the current result already marked as seen;
    /// later results are published after each relevant write.
    fn subscribe(&self, collection: &str, query: Query) -> Result<watch::Receiver<Vec<Document>>>;

    /// Number of live subscriptions on `collection`.
    fn active_subscriptions(&self, collection: &str) -> usize;
}

struct Watcher {
    collection: String,
    query: Query,
    tx: watch::Sender<Vec<Document>>,
}

/// SQLite implementation of [`DocumentStore`].
pub struct SqliteDocumentStore {
    db: Arc<Database>,
    watchers: Mutex<Vec<Watcher>>,
}

impl SqliteDocumentStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// A store over a fresh in-memory database.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Arc::new(Database::in_memory()?)))
    }

    fn run_query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        query.validate()?;
        let (sql, params) = build_select(collection, query);
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| AviaryError::Storage(format!("Failed to prepare query: {}", e)))?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|e| AviaryError::Storage(e.to_string()))?;

            let mut documents = Vec::new();
            for row in rows {
                let (id, data) = row.map_err(|e| AviaryError::Storage(e.to_string()))?;
                documents.push(Document::new(id, parse_fields(&data)?));
            }
            Ok(documents)
        })
    }

    /// Re-run every live subscription whose collection matches `affected`.
    fn notify<F>(&self, affected: F)
    where
        F: Fn(&str) -> bool,
    {
        let mut watchers = match self.watchers.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Subscription registry poisoned: {}", e);
                return;
            }
        };

        watchers.retain(|w| !w.tx.is_closed());

        for watcher in watchers.iter().filter(|w| affected(&w.collection)) {
            match self.run_query(&watcher.collection, &watcher.query) {
                Ok(documents) => {
                    watcher.tx.send_if_modified(|current| {
                        if *current == documents {
                            false
                        } else {
                            *current = documents;
                            true
                        }
                    });
                }
                Err(e) => warn!(
                    collection = %watcher.collection,
                    "Failed to refresh subscription: {}", e
                ),
            }
        }
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn add(&self, collection: &str, fields: Fields) -> Result<Document> {
        let id = Uuid::new_v4().to_string();
        self.set(collection, &id, fields.clone())?;
        Ok(Document::new(id, fields))
    }

    fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let data = serde_json::to_string(&fields)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT (collection, id) DO UPDATE SET
                    data = excluded.data,
                    updated_at = strftime('%s', 'now')",
                rusqlite::params![collection, id, data],
            )
            .map_err(|e| AviaryError::Storage(format!("Failed to write document: {}", e)))?;
            Ok(())
        })?;

        debug!(collection, id, "Document written");
        self.notify(|c| c == collection);
        Ok(())
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let data: Option<String> = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT data FROM documents WHERE collection = ?1 AND id = ?2")
                .map_err(|e| AviaryError::Storage(e.to_string()))?;
            let mut rows = stmt
                .query(rusqlite::params![collection, id])
                .map_err(|e| AviaryError::Storage(e.to_string()))?;
            match rows.next().map_err(|e| AviaryError::Storage(e.to_string()))? {
                Some(row) => Ok(Some(
                    row.get(0).map_err(|e| AviaryError::Storage(e.to_string()))?,
                )),
                None => Ok(None),
            }
        })?;

        match data {
            Some(d) => Ok(Some(Document::new(id, parse_fields(&d)?))),
            None => Ok(None),
        }
    }

    fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let prefix = format!("{}/{}/", collection, id);
        let (removed, nested) = self.db.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| AviaryError::Storage(e.to_string()))?;
            let removed = tx
                .execute(
                    "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                    rusqlite::params![collection, id],
                )
                .map_err(|e| AviaryError::Storage(format!("Failed to delete document: {}", e)))?;
            let nested = tx
                .execute(
                    "DELETE FROM documents WHERE substr(collection, 1, length(?1)) = ?1",
                    rusqlite::params![prefix],
                )
                .map_err(|e| {
                    AviaryError::Storage(format!("Failed to delete nested documents: {}", e))
                })?;
            tx.commit()
                .map_err(|e| AviaryError::Storage(e.to_string()))?;
            Ok((removed, nested))
        })?;

        debug!(collection, id, nested, "Document deleted");
        self.notify(|c| c == collection || c.starts_with(&prefix));
        Ok(removed > 0)
    }

    fn delete_collection(&self, collection: &str) -> Result<usize> {
        let prefix = format!("{}/", collection);
        let removed = self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM documents
                 WHERE collection = ?1 OR substr(collection, 1, length(?2)) = ?2",
                rusqlite::params![collection, prefix],
            )
            .map_err(|e| AviaryError::Storage(format!("Failed to delete collection: {}", e)))
        })?;

        debug!(collection, removed, "Collection deleted");
        self.notify(|c| c == collection || c.starts_with(&prefix));
        Ok(removed)
    }

    fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        self.run_query(collection, query)
    }

    fn subscribe(&self, collection: &str, query: Query) -> Result<watch::Receiver<Vec<Document>>> {
        // Hold the registry while reading the initial result so no write
        // can slip between the read and the registration.
        let mut watchers = self
            .watchers
            .lock()
            .map_err(|e| AviaryError::Storage(format!("Subscription registry poisoned: {}", e)))?;

        let initial = self.run_query(collection, &query)?;
        let (tx, rx) = watch::channel(initial);
        watchers.push(Watcher {
            collection: collection.to_string(),
            query,
            tx,
        });

        debug!(collection, "Subscription registered");
        Ok(rx)
    }

    fn active_subscriptions(&self, collection: &str) -> usize {
        match self.watchers.lock() {
            Ok(watchers) => watchers
                .iter()
                .filter(|w| w.collection == collection && !w.tx.is_closed())
                .count(),
            Err(_) => 0,
        }
    }
}

fn parse_fields(data: &str) -> Result<Fields> {
    match serde_json::from_str::<Value>(data)? {
        Value::Object(map) => Ok(map),
        other => Err(AviaryError::Serialization(format!(
            "document body is not an object: {}",
            other
        ))),
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Build the SELECT for `query`. Field names must already be validated.
fn build_select(collection: &str, query: &Query) -> (String, Vec<SqlValue>) {
    let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?");
    let mut params = vec![SqlValue::Text(collection.to_string())];

    for predicate in &query.predicates {
        sql.push_str(&format!(
            " AND json_extract(data, '$.{}') {} ?",
            predicate.field(),
            predicate.operator()
        ));
        params.push(to_sql_value(predicate.value()));
    }

    match &query.order_by {
        Some(order) => {
            let expr = format!("json_extract(data, '$.{}')", order.field);
            let cmp = match order.direction {
                Direction::Ascending => ">",
                Direction::Descending => "<",
            };
            if let Some(cursor) = &query.start_after {
                let value = to_sql_value(cursor.get(&order.field).unwrap_or(&Value::Null));
                sql.push_str(&format!(
                    " AND ({expr} {cmp} ? OR ({expr} = ? AND id {cmp} ?))"
                ));
                params.push(value.clone());
                params.push(value);
                params.push(SqlValue::Text(cursor.id.clone()));
            }
            let dir = order.direction.as_sql();
            sql.push_str(&format!(" ORDER BY {expr} {dir}, id {dir}"));
        }
        None => {
            if let Some(cursor) = &query.start_after {
                sql.push_str(" AND id > ?");
                params.push(SqlValue::Text(cursor.id.clone()));
            }
            sql.push_str(" ORDER BY id ASC");
        }
    }

    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        params.push(SqlValue::Integer(limit as i64));
    }

    (sql, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{OrderBy, Predicate};
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn store() -> SqliteDocumentStore {
        SqliteDocumentStore::in_memory().unwrap()
    }

    fn seed_birds(store: &SqliteDocumentStore) {
        for (id, bird, ts) in [
            ("a", "Mallard", 100),
            ("b", "Robin", 200),
            ("c", "Mallard", 300),
            ("d", "Heron", 300),
            ("e", "Robin", 400),
        ] {
            store
                .set("birds", id, fields(json!({"bird": bird, "timestamp": ts})))
                .unwrap();
        }
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    #[test]
    fn test_add_and_get() {
        let store = store();
        let doc = store
            .add("chats", fields(json!({"title": "Robins", "createdAt": 1})))
            .unwrap();
        assert!(!doc.id.is_empty());

        let fetched = store.get("chats", &doc.id).unwrap().unwrap();
        assert_eq!(fetched, doc);
        assert_eq!(fetched.str_field("title"), Some("Robins"));
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = store();
        assert!(store.get("chats", "nope").unwrap().is_none());
    }

    #[test]
    fn test_set_overwrites() {
        let store = store();
        store.set("chats", "t1", fields(json!({"title": "One"}))).unwrap();
        store.set("chats", "t1", fields(json!({"title": "Two"}))).unwrap();

        let docs = store.query("chats", &Query::new()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].str_field("title"), Some("Two"));
    }

    #[test]
    fn test_delete_cascades_to_nested_collections() {
        let store = store();
        store.set("chats", "t1", fields(json!({"title": "One"}))).unwrap();
        store.set("chats", "t10", fields(json!({"title": "Ten"}))).unwrap();
        store
            .add("chats/t1/messages", fields(json!({"content": "hi"})))
            .unwrap();
        store
            .add("chats/t10/messages", fields(json!({"content": "keep"})))
            .unwrap();

        assert!(store.delete("chats", "t1").unwrap());

        assert!(store.get("chats", "t1").unwrap().is_none());
        assert!(store.query("chats/t1/messages", &Query::new()).unwrap().is_empty());
        // A sibling whose id shares the prefix is untouched.
        assert_eq!(store.query("chats/t10/messages", &Query::new()).unwrap().len(), 1);
        assert!(!store.delete("chats", "t1").unwrap());
    }

    #[test]
    fn test_delete_collection() {
        let store = store();
        seed_birds(&store);
        store.set("chats", "t1", fields(json!({"title": "x"}))).unwrap();

        assert_eq!(store.delete_collection("birds").unwrap(), 5);
        assert!(store.query("birds", &Query::new()).unwrap().is_empty());
        assert_eq!(store.query("chats", &Query::new()).unwrap().len(), 1);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[test]
    fn test_query_filters_and_order() {
        let store = store();
        seed_birds(&store);

        let docs = store
            .query(
                "birds",
                &Query::new()
                    .filter(Predicate::eq("bird", "Mallard"))
                    .order_by(OrderBy::desc("timestamp")),
            )
            .unwrap();
        assert_eq!(ids(&docs), vec!["c", "a"]);

        let docs = store
            .query(
                "birds",
                &Query::new()
                    .filter(Predicate::gte("timestamp", 200))
                    .filter(Predicate::lte("timestamp", 300))
                    .order_by(OrderBy::asc("timestamp")),
            )
            .unwrap();
        assert_eq!(ids(&docs), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_query_cursor_pagination_with_ties() {
        let store = store();
        seed_birds(&store);
        let base = Query::new().order_by(OrderBy::desc("timestamp")).limit(2);

        let first = store.query("birds", &base).unwrap();
        assert_eq!(ids(&first), vec!["e", "d"]);

        let second = store
            .query("birds", &base.clone().start_after(first[1].clone()))
            .unwrap();
        assert_eq!(ids(&second), vec!["c", "b"]);

        let third = store
            .query("birds", &base.clone().start_after(second[1].clone()))
            .unwrap();
        assert_eq!(ids(&third), vec!["a"]);

        let fourth = store
            .query("birds", &base.start_after(third[0].clone()))
            .unwrap();
        assert!(fourth.is_empty());
    }

    #[test]
    fn test_query_default_order_is_by_id() {
        let store = store();
        seed_birds(&store);
        let docs = store.query("birds", &Query::new().limit(3)).unwrap();
        assert_eq!(ids(&docs), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_query_rejects_bad_field() {
        let store = store();
        let result = store.query("birds", &Query::new().filter(Predicate::eq("x'", 1)));
        assert!(matches!(result, Err(AviaryError::InvalidInput(_))));
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    #[test]
    fn test_subscribe_starts_with_current_result() {
        let store = store();
        seed_birds(&store);
        let rx = store
            .subscribe("birds", Query::new().order_by(OrderBy::desc("timestamp")).limit(1))
            .unwrap();
        assert!(!rx.has_changed().unwrap());
        assert_eq!(ids(&rx.borrow()), vec!["e"]);
    }

    #[test]
    fn test_subscription_receives_writes() {
        let store = store();
        let mut rx = store
            .subscribe("chats", Query::new().order_by(OrderBy::desc("createdAt")))
            .unwrap();
        assert!(rx.borrow().is_empty());

        store
            .set("chats", "t1", fields(json!({"title": "One", "createdAt": 1})))
            .unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(ids(&rx.borrow_and_update()), vec!["t1"]);

        store.delete("chats", "t1").unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_empty());
    }

    #[test]
    fn test_subscription_ignores_other_collections_and_unchanged_results() {
        let store = store();
        let rx = store
            .subscribe("birds", Query::new().filter(Predicate::eq("bird", "Robin")))
            .unwrap();

        store.set("chats", "t1", fields(json!({"title": "x"}))).unwrap();
        assert!(!rx.has_changed().unwrap());

        store
            .set("birds", "m", fields(json!({"bird": "Mallard", "timestamp": 1})))
            .unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_nested_subscription_notified_on_parent_delete() {
        let store = store();
        store.set("chats", "t1", fields(json!({"title": "x"}))).unwrap();
        store
            .add("chats/t1/messages", fields(json!({"content": "hi", "timestamp": 1})))
            .unwrap();

        let rx = store
            .subscribe("chats/t1/messages", Query::new().order_by(OrderBy::asc("timestamp")))
            .unwrap();
        assert_eq!(rx.borrow().len(), 1);

        store.delete("chats", "t1").unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow().is_empty());
    }

    #[test]
    fn test_dropped_receiver_unsubscribes() {
        let store = store();
        let rx = store.subscribe("birds", Query::new()).unwrap();
        let rx2 = store.subscribe("birds", Query::new()).unwrap();
        assert_eq!(store.active_subscriptions("birds"), 2);

        drop(rx);
        assert_eq!(store.active_subscriptions("birds"), 1);

        store.set("birds", "x", fields(json!({"bird": "Wren"}))).unwrap();
        assert_eq!(store.watchers.lock().unwrap().len(), 1);

        drop(rx2);
        assert_eq!(store.active_subscriptions("birds"), 0);
    }

    #[tokio::test]
    async fn test_subscription_changed_wakes_waiter() {
        let store = Arc::new(store());
        let mut rx = store.subscribe("birds", Query::new()).unwrap();

        let writer = store.clone();
        let handle = tokio::spawn(async move {
            writer
                .set("birds", "x", fields(json!({"bird": "Wren"})))
                .unwrap();
        });

        rx.changed().await.unwrap();
        assert_eq!(ids(&rx.borrow()), vec!["x"]);
        handle.await.unwrap();
    }
}
