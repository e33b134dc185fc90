//! In-memory document store for development and testing
//!
//! Committed documents live in one map per collection. Each open transaction
//! stages its writes in an overlay that reads made through the same session
//! see, and that is applied atomically on commit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;

use super::core::{
    DeleteOutcome, Document, DocumentStore, SessionHandle, SessionId, StoreError, StoreResult,
    StoreSession, TransactionState, UpdateOutcome, ID_FIELD,
};
use crate::context::Context;
use crate::filter::Filter;

#[derive(Debug, Clone)]
struct StoredDocument {
    seq: u64,
    doc: Document,
}

#[derive(Debug, Clone)]
enum StagedWrite {
    Inserted(StoredDocument),
    Replaced(StoredDocument),
    /// Deleted then inserted again under the same id by one transaction
    Reinserted(StoredDocument),
    Deleted,
}

/// Writes staged by one transaction, keyed by collection then id
#[derive(Debug, Default)]
struct StagedWrites {
    collections: HashMap<String, HashMap<String, StagedWrite>>,
}

type CollectionMap = HashMap<String, HashMap<String, StoredDocument>>;

struct StoreInner {
    collections: RwLock<CollectionMap>,
    transactions: DashMap<SessionId, StagedWrites>,
    open_sessions: DashMap<SessionId, ()>,
    next_session: AtomicU64,
    next_seq: AtomicU64,
    latency: Option<Duration>,
}

/// In-memory `DocumentStore`. Clones share the same data.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<StoreInner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A store that waits `latency` before serving each operation
    pub fn with_latency(latency: Duration) -> Self {
        Self::build(Some(latency))
    }

    fn build(latency: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                collections: RwLock::new(HashMap::new()),
                transactions: DashMap::new(),
                open_sessions: DashMap::new(),
                next_session: AtomicU64::new(1),
                next_seq: AtomicU64::new(1),
                latency,
            }),
        }
    }

    /// Committed documents in `collection`
    pub fn document_count(&self, collection: &str) -> usize {
        self.inner
            .collections
            .read()
            .get(collection)
            .map_or(0, HashMap::len)
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Sessions started and not yet ended
    pub fn active_sessions(&self) -> usize {
        self.inner.open_sessions.len()
    }

    /// Transactions currently staging writes
    pub fn active_transactions(&self) -> usize {
        self.inner.transactions.len()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.inner.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// The transaction a context routes through, if any
    fn transaction_for(&self, ctx: &Context) -> Option<SessionId> {
        let session = ctx.session()?;
        if !session.transaction_state().is_in_progress() {
            return None;
        }
        let id = session.id();
        self.inner.transactions.contains_key(&id).then_some(id)
    }

    fn next_seq(&self) -> u64 {
        self.inner.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Committed documents merged with the staged writes of `txn`, in
    /// insertion order.
    fn snapshot(&self, txn: Option<SessionId>, collection: &str) -> Vec<StoredDocument> {
        let mut merged: HashMap<String, StoredDocument> = self
            .inner
            .collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default();

        if let Some(staged) = txn.and_then(|id| self.inner.transactions.get(&id)) {
            if let Some(writes) = staged.collections.get(collection) {
                for (id, write) in writes {
                    match write {
                        StagedWrite::Inserted(stored)
                        | StagedWrite::Replaced(stored)
                        | StagedWrite::Reinserted(stored) => {
                            merged.insert(id.clone(), stored.clone());
                        }
                        StagedWrite::Deleted => {
                            merged.remove(id);
                        }
                    }
                }
            }
        }

        let mut docs: Vec<StoredDocument> = merged.into_values().collect();
        docs.sort_by_key(|stored| stored.seq);
        docs
    }

    fn lookup(&self, txn: Option<SessionId>, collection: &str, id: &str) -> Option<StoredDocument> {
        if let Some(staged) = txn.and_then(|txn| self.inner.transactions.get(&txn)) {
            match staged.collections.get(collection).and_then(|writes| writes.get(id)) {
                Some(StagedWrite::Inserted(stored))
                | Some(StagedWrite::Replaced(stored))
                | Some(StagedWrite::Reinserted(stored)) => return Some(stored.clone()),
                Some(StagedWrite::Deleted) => return None,
                None => {}
            }
        }
        self.inner
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    fn stage(&self, txn: SessionId, collection: &str, id: &str, write: StagedWrite) -> StoreResult<()> {
        let mut staged = self
            .inner
            .transactions
            .get_mut(&txn)
            .ok_or(StoreError::NoActiveTransaction(txn))?;
        let writes = staged.collections.entry(collection.to_string()).or_default();

        let merged = match (writes.remove(id), write) {
            // Changes to a document inserted by this transaction stay inserts
            (Some(StagedWrite::Inserted(_)), StagedWrite::Replaced(stored)) => {
                Some(StagedWrite::Inserted(stored))
            }
            (Some(StagedWrite::Inserted(_)), StagedWrite::Deleted) => None,
            // The committed document this transaction deleted is superseded
            (Some(StagedWrite::Deleted), StagedWrite::Inserted(stored))
            | (Some(StagedWrite::Reinserted(_)), StagedWrite::Replaced(stored)) => {
                Some(StagedWrite::Reinserted(stored))
            }
            (_, write) => Some(write),
        };
        if let Some(write) = merged {
            writes.insert(id.to_string(), write);
        }
        Ok(())
    }

    fn commit_staged(&self, txn: SessionId) -> StoreResult<()> {
        let (_, staged) = self
            .inner
            .transactions
            .remove(&txn)
            .ok_or(StoreError::NoActiveTransaction(txn))?;

        let mut collections = self.inner.collections.write();

        for (collection, writes) in &staged.collections {
            let committed = collections.get(collection);
            for (id, write) in writes {
                let exists = committed.map_or(false, |docs| docs.contains_key(id));
                if matches!(write, StagedWrite::Inserted(_)) && exists {
                    return Err(StoreError::TransactionConflict(format!(
                        "document {} in '{}' was inserted concurrently",
                        id, collection
                    )));
                }
            }
        }

        for (collection, writes) in staged.collections {
            let docs = collections.entry(collection).or_default();
            for (id, write) in writes {
                match write {
                    StagedWrite::Inserted(stored) | StagedWrite::Reinserted(stored) => {
                        docs.insert(id, stored);
                    }
                    StagedWrite::Replaced(stored) => {
                        // A concurrent delete wins over a staged replace
                        if let Some(current) = docs.get_mut(&id) {
                            current.doc = stored.doc;
                        }
                    }
                    StagedWrite::Deleted => {
                        docs.remove(&id);
                    }
                }
            }
        }
        Ok(())
    }

    fn discard_staged(&self, txn: SessionId) -> bool {
        self.inner.transactions.remove(&txn).is_some()
    }
}

fn document_id(collection: &str, doc: &Document) -> StoreResult<String> {
    match doc.get(ID_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        _ => Err(StoreError::Validation(format!(
            "document for '{}' has no string {} field",
            collection, ID_FIELD
        ))),
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert(&self, ctx: &Context, collection: &str, doc: Document) -> StoreResult<()> {
        self.simulate_latency().await;
        let id = document_id(collection, &doc)?;
        let txn = self.transaction_for(ctx);

        if self.lookup(txn, collection, &id).is_some() {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                id,
            });
        }

        let stored = StoredDocument {
            seq: self.next_seq(),
            doc,
        };
        match txn {
            Some(txn) => self.stage(txn, collection, &id, StagedWrite::Inserted(stored))?,
            None => {
                let mut collections = self.inner.collections.write();
                let docs = collections.entry(collection.to_string()).or_default();
                if docs.contains_key(&id) {
                    return Err(StoreError::DuplicateKey {
                        collection: collection.to_string(),
                        id,
                    });
                }
                docs.insert(id.clone(), stored);
            }
        }

        debug!("Inserted document {} into '{}'", id, collection);
        Ok(())
    }

    async fn replace_by_id(
        &self,
        ctx: &Context,
        collection: &str,
        id: &str,
        mut doc: Document,
    ) -> StoreResult<UpdateOutcome> {
        self.simulate_latency().await;
        doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));

        match self.transaction_for(ctx) {
            Some(txn) => {
                let Some(current) = self.lookup(Some(txn), collection, id) else {
                    return Ok(UpdateOutcome::default());
                };
                let modified = u64::from(current.doc != doc);
                self.stage(
                    txn,
                    collection,
                    id,
                    StagedWrite::Replaced(StoredDocument {
                        seq: current.seq,
                        doc,
                    }),
                )?;
                Ok(UpdateOutcome {
                    matched: 1,
                    modified,
                })
            }
            None => {
                let mut collections = self.inner.collections.write();
                let Some(current) = collections
                    .get_mut(collection)
                    .and_then(|docs| docs.get_mut(id))
                else {
                    return Ok(UpdateOutcome::default());
                };
                let modified = u64::from(current.doc != doc);
                current.doc = doc;
                Ok(UpdateOutcome {
                    matched: 1,
                    modified,
                })
            }
        }
    }

    async fn delete_by_id(
        &self,
        ctx: &Context,
        collection: &str,
        id: &str,
    ) -> StoreResult<DeleteOutcome> {
        self.simulate_latency().await;
        match self.transaction_for(ctx) {
            Some(txn) => {
                if self.lookup(Some(txn), collection, id).is_none() {
                    return Ok(DeleteOutcome::default());
                }
                self.stage(txn, collection, id, StagedWrite::Deleted)?;
                Ok(DeleteOutcome { deleted: 1 })
            }
            None => {
                let removed = self
                    .inner
                    .collections
                    .write()
                    .get_mut(collection)
                    .and_then(|docs| docs.remove(id));
                Ok(DeleteOutcome {
                    deleted: u64::from(removed.is_some()),
                })
            }
        }
    }

    async fn find_by_id(
        &self,
        ctx: &Context,
        collection: &str,
        id: &str,
    ) -> StoreResult<Option<Document>> {
        self.simulate_latency().await;
        let txn = self.transaction_for(ctx);
        Ok(self.lookup(txn, collection, id).map(|stored| stored.doc))
    }

    async fn find(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Filter,
    ) -> StoreResult<Vec<Document>> {
        self.simulate_latency().await;
        let txn = self.transaction_for(ctx);
        Ok(self
            .snapshot(txn, collection)
            .into_iter()
            .filter(|stored| filter.matches(&stored.doc))
            .map(|stored| stored.doc)
            .collect())
    }

    async fn count(&self, ctx: &Context, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.simulate_latency().await;
        let txn = self.transaction_for(ctx);
        let count = self
            .snapshot(txn, collection)
            .iter()
            .filter(|stored| filter.matches(&stored.doc))
            .count();
        Ok(count as u64)
    }

    async fn delete_many(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Filter,
    ) -> StoreResult<DeleteOutcome> {
        self.simulate_latency().await;
        match self.transaction_for(ctx) {
            Some(txn) => {
                let mut deleted = 0;
                for stored in self.snapshot(Some(txn), collection) {
                    if filter.matches(&stored.doc) {
                        let id = document_id(collection, &stored.doc)?;
                        self.stage(txn, collection, &id, StagedWrite::Deleted)?;
                        deleted += 1;
                    }
                }
                Ok(DeleteOutcome { deleted })
            }
            None => {
                let mut collections = self.inner.collections.write();
                let Some(docs) = collections.get_mut(collection) else {
                    return Ok(DeleteOutcome::default());
                };
                let before = docs.len();
                docs.retain(|_, stored| !filter.matches(&stored.doc));
                Ok(DeleteOutcome {
                    deleted: (before - docs.len()) as u64,
                })
            }
        }
    }

    async fn start_session(&self) -> StoreResult<SessionHandle> {
        self.simulate_latency().await;
        let id = SessionId(self.inner.next_session.fetch_add(1, Ordering::Relaxed));
        self.inner.open_sessions.insert(id, ());
        debug!("Started {}", id);
        Ok(Arc::new(MemorySession {
            id,
            store: self.clone(),
            state: Mutex::new(SessionState {
                transaction: TransactionState::None,
                ended: false,
            }),
        }))
    }
}

#[derive(Debug)]
struct SessionState {
    transaction: TransactionState,
    ended: bool,
}

/// Session handed out by `InMemoryStore`
pub struct MemorySession {
    id: SessionId,
    store: InMemoryStore,
    state: Mutex<SessionState>,
}

impl MemorySession {
    pub fn is_ended(&self) -> bool {
        self.state.lock().ended
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn transaction_state(&self) -> TransactionState {
        self.state.lock().transaction
    }

    async fn start_transaction(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.ended {
            return Err(StoreError::SessionEnded(self.id));
        }
        if state.transaction.is_in_progress() {
            return Err(StoreError::TransactionInProgress(self.id));
        }
        self.store
            .inner
            .transactions
            .insert(self.id, StagedWrites::default());
        state.transaction = TransactionState::InProgress;
        debug!("Started transaction on {}", self.id);
        Ok(())
    }

    async fn commit_transaction(&self, _ctx: &Context) -> StoreResult<()> {
        self.store.simulate_latency().await;
        let mut state = self.state.lock();
        if !state.transaction.is_in_progress() {
            return Err(StoreError::NoActiveTransaction(self.id));
        }
        let result = self.store.commit_staged(self.id);
        state.transaction = match result {
            Ok(()) => TransactionState::Committed,
            Err(_) => TransactionState::Aborted,
        };
        debug!("Commit on {} finished: {:?}", self.id, state.transaction);
        result
    }

    async fn abort_transaction(&self, _ctx: &Context) -> StoreResult<()> {
        let mut state = self.state.lock();
        if !state.transaction.is_in_progress() {
            return Err(StoreError::NoActiveTransaction(self.id));
        }
        self.store.discard_staged(self.id);
        state.transaction = TransactionState::Aborted;
        debug!("Aborted transaction on {}", self.id);
        Ok(())
    }

    async fn end_session(&self) {
        let mut state = self.state.lock();
        if state.ended {
            return;
        }
        if state.transaction.is_in_progress() {
            debug!("Ending {} with a transaction in progress; discarding it", self.id);
            self.store.discard_staged(self.id);
            state.transaction = TransactionState::Aborted;
        }
        state.ended = true;
        self.store.inner.open_sessions.remove(&self.id);
        debug!("Ended {}", self.id);
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.ended {
            self.store.discard_staged(self.id);
            self.store.inner.open_sessions.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, name: &str, age: u64) -> Document {
        match json!({ "_id": id, "name": name, "age": age }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryStore::new();
        let ctx = Context::background();

        store.insert(&ctx, "docs", doc("a", "Ali", 24)).await.unwrap();
        store.insert(&ctx, "docs", doc("b", "Reza", 26)).await.unwrap();

        let found = store.find_by_id(&ctx, "docs", "a").await.unwrap().unwrap();
        assert_eq!(found["name"], json!("Ali"));

        let all = store.find(&ctx, "docs", &Filter::new()).await.unwrap();
        let names: Vec<&Value> = all.iter().map(|d| &d["name"]).collect();
        assert_eq!(names, vec![&json!("Ali"), &json!("Reza")]);

        let count = store
            .count(&ctx, "docs", &Filter::new().eq("age", 24))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_id() {
        let store = InMemoryStore::new();
        let ctx = Context::background();
        store.insert(&ctx, "docs", doc("a", "Ali", 24)).await.unwrap();

        let err = store.insert(&ctx, "docs", doc("a", "Ali", 24)).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::DuplicateKey {
                collection: "docs".to_string(),
                id: "a".to_string()
            }
        );

        let err = store.insert(&ctx, "docs", Document::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_replace_and_delete_outcomes() {
        let store = InMemoryStore::new();
        let ctx = Context::background();
        store.insert(&ctx, "docs", doc("a", "Ali", 24)).await.unwrap();

        let outcome = store
            .replace_by_id(&ctx, "docs", "a", doc("a", "Ali", 25))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 1 });

        let outcome = store
            .replace_by_id(&ctx, "docs", "a", doc("a", "Ali", 25))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 0 });

        let outcome = store
            .replace_by_id(&ctx, "docs", "missing", doc("missing", "X", 1))
            .await
            .unwrap();
        assert_eq!(outcome.matched, 0);

        assert_eq!(store.delete_by_id(&ctx, "docs", "a").await.unwrap().deleted, 1);
        assert_eq!(store.delete_by_id(&ctx, "docs", "a").await.unwrap().deleted, 0);
    }

    #[tokio::test]
    async fn test_delete_many() {
        let store = InMemoryStore::new();
        let ctx = Context::background();
        store.insert(&ctx, "docs", doc("a", "Ali", 24)).await.unwrap();
        store.insert(&ctx, "docs", doc("b", "Mehran", 24)).await.unwrap();
        store.insert(&ctx, "docs", doc("c", "Reza", 26)).await.unwrap();

        let outcome = store
            .delete_many(&ctx, "docs", &Filter::new().eq("age", 24))
            .await
            .unwrap();
        assert_eq!(outcome.deleted, 2);
        assert_eq!(store.document_count("docs"), 1);
    }

    #[tokio::test]
    async fn test_transaction_writes_are_isolated_until_commit() {
        let store = InMemoryStore::new();
        let session = store.start_session().await.unwrap();
        session.start_transaction().await.unwrap();
        let txn_ctx = Context::background().with_session(session.clone());
        let plain = Context::background();

        store.insert(&txn_ctx, "docs", doc("a", "Ali", 24)).await.unwrap();
        assert_eq!(store.count(&txn_ctx, "docs", &Filter::new()).await.unwrap(), 1);
        assert_eq!(store.count(&plain, "docs", &Filter::new()).await.unwrap(), 0);

        session.commit_transaction(&txn_ctx).await.unwrap();
        assert_eq!(session.transaction_state(), TransactionState::Committed);
        assert_eq!(store.count(&plain, "docs", &Filter::new()).await.unwrap(), 1);

        session.end_session().await;
        assert_eq!(store.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_abort_discards_staged_writes() {
        let store = InMemoryStore::new();
        let plain = Context::background();
        store.insert(&plain, "docs", doc("a", "Ali", 24)).await.unwrap();

        let session = store.start_session().await.unwrap();
        session.start_transaction().await.unwrap();
        let txn_ctx = plain.with_session(session.clone());

        store.insert(&txn_ctx, "docs", doc("b", "Reza", 26)).await.unwrap();
        store.delete_by_id(&txn_ctx, "docs", "a").await.unwrap();
        assert!(store.find_by_id(&txn_ctx, "docs", "a").await.unwrap().is_none());

        session.abort_transaction(&txn_ctx).await.unwrap();
        assert_eq!(store.document_count("docs"), 1);
        assert!(store.find_by_id(&plain, "docs", "a").await.unwrap().is_some());
        assert_eq!(store.active_transactions(), 0);
    }

    #[tokio::test]
    async fn test_commit_conflict_on_concurrent_insert() {
        let store = InMemoryStore::new();
        let session = store.start_session().await.unwrap();
        session.start_transaction().await.unwrap();
        let txn_ctx = Context::background().with_session(session.clone());

        store.insert(&txn_ctx, "docs", doc("a", "Ali", 24)).await.unwrap();
        store
            .insert(&Context::background(), "docs", doc("a", "Omid", 27))
            .await
            .unwrap();

        let err = session.commit_transaction(&txn_ctx).await.unwrap_err();
        assert!(matches!(err, StoreError::TransactionConflict(_)));
        assert_eq!(session.transaction_state(), TransactionState::Aborted);
        assert_eq!(store.document_count("docs"), 1);
    }

    #[tokio::test]
    async fn test_session_state_errors() {
        let store = InMemoryStore::new();
        let session = store.start_session().await.unwrap();
        let ctx = Context::background();

        assert_eq!(
            session.commit_transaction(&ctx).await,
            Err(StoreError::NoActiveTransaction(session.id()))
        );
        session.start_transaction().await.unwrap();
        assert_eq!(
            session.start_transaction().await,
            Err(StoreError::TransactionInProgress(session.id()))
        );

        session.end_session().await;
        assert_eq!(session.transaction_state(), TransactionState::Aborted);
        assert_eq!(
            session.start_transaction().await,
            Err(StoreError::SessionEnded(session.id()))
        );
        assert_eq!(store.active_transactions(), 0);
    }

    #[tokio::test]
    async fn test_staged_insert_then_delete_leaves_nothing() {
        let store = InMemoryStore::new();
        let session = store.start_session().await.unwrap();
        session.start_transaction().await.unwrap();
        let txn_ctx = Context::background().with_session(session.clone());

        store.insert(&txn_ctx, "docs", doc("a", "Ali", 24)).await.unwrap();
        store
            .replace_by_id(&txn_ctx, "docs", "a", doc("a", "Ali", 30))
            .await
            .unwrap();
        let found = store.find_by_id(&txn_ctx, "docs", "a").await.unwrap().unwrap();
        assert_eq!(found["age"], json!(30));

        store.delete_by_id(&txn_ctx, "docs", "a").await.unwrap();
        session.commit_transaction(&txn_ctx).await.unwrap();
        assert_eq!(store.document_count("docs"), 0);
    }

    #[tokio::test]
    async fn test_staged_delete_then_insert_replaces_committed_document() {
        let store = InMemoryStore::new();
        let plain = Context::background();
        store.insert(&plain, "docs", doc("a", "Ali", 24)).await.unwrap();

        let session = store.start_session().await.unwrap();
        session.start_transaction().await.unwrap();
        let txn_ctx = plain.with_session(session.clone());

        store.delete_by_id(&txn_ctx, "docs", "a").await.unwrap();
        store.insert(&txn_ctx, "docs", doc("a", "Omid", 27)).await.unwrap();
        store
            .replace_by_id(&txn_ctx, "docs", "a", doc("a", "Omid", 28))
            .await
            .unwrap();

        let outside = store.find_by_id(&plain, "docs", "a").await.unwrap().unwrap();
        assert_eq!(outside["name"], json!("Ali"));

        session.commit_transaction(&txn_ctx).await.unwrap();
        assert_eq!(session.transaction_state(), TransactionState::Committed);

        let stored = store.find_by_id(&plain, "docs", "a").await.unwrap().unwrap();
        assert_eq!(stored["name"], json!("Omid"));
        assert_eq!(stored["age"], json!(28));
        assert_eq!(store.document_count("docs"), 1);
    }

    #[tokio::test]
    async fn test_reinsert_survives_concurrent_delete() {
        let store = InMemoryStore::new();
        let plain = Context::background();
        store.insert(&plain, "docs", doc("a", "Ali", 24)).await.unwrap();

        let session = store.start_session().await.unwrap();
        session.start_transaction().await.unwrap();
        let txn_ctx = plain.with_session(session.clone());

        store.delete_by_id(&txn_ctx, "docs", "a").await.unwrap();
        store.insert(&txn_ctx, "docs", doc("a", "Reza", 26)).await.unwrap();
        store.delete_by_id(&plain, "docs", "a").await.unwrap();

        session.commit_transaction(&txn_ctx).await.unwrap();
        let stored = store.find_by_id(&plain, "docs", "a").await.unwrap().unwrap();
        assert_eq!(stored["name"], json!("Reza"));
    }
}
