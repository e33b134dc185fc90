//! Core Document Store Traits
//!
//! This module defines the traits a document store must implement to back the
//! ODM. The ODM never talks to a storage engine directly; every read, write and
//! session primitive goes through `DocumentStore` and `StoreSession`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::Context;
use crate::filter::Filter;

/// A stored document: a JSON object keyed by field name.
pub type Document = Map<String, Value>;

/// Document key holding the canonical identity.
pub const ID_FIELD: &str = "_id";

/// Shared handle to an open store session.
pub type SessionHandle = Arc<dyn StoreSession>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a document store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate key {id} in collection '{collection}'")]
    DuplicateKey { collection: String, id: String },

    #[error("document rejected: {0}")]
    Validation(String),

    #[error("session {0} has no transaction in progress")]
    NoActiveTransaction(SessionId),

    #[error("session {0} already has a transaction in progress")]
    TransactionInProgress(SessionId),

    #[error("session {0} has already ended")]
    SessionEnded(SessionId),

    #[error("transaction conflict: {0}")]
    TransactionConflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// The store primitive an operation invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Insert,
    ReplaceById,
    DeleteById,
    FindById,
    Find,
    Count,
    DeleteMany,
    StartSession,
    StartTransaction,
    CommitTransaction,
    AbortTransaction,
}

impl StoreOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOperation::Insert => "insert",
            StoreOperation::ReplaceById => "replace_by_id",
            StoreOperation::DeleteById => "delete_by_id",
            StoreOperation::FindById => "find_by_id",
            StoreOperation::Find => "find",
            StoreOperation::Count => "count",
            StoreOperation::DeleteMany => "delete_many",
            StoreOperation::StartSession => "start_session",
            StoreOperation::StartTransaction => "start_transaction",
            StoreOperation::CommitTransaction => "commit_transaction",
            StoreOperation::AbortTransaction => "abort_transaction",
        }
    }
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of replacing a document by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

/// Result of deleting documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOutcome {
    pub deleted: u64,
}

/// Store-assigned session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Transaction state of a store session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No transaction has been started on the session.
    None,
    InProgress,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, TransactionState::InProgress)
    }
}

/// Abstract document store.
///
/// Operations receive the caller's `Context`. When the context carries a
/// session with a transaction in progress, writes and reads must be routed
/// through that transaction.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document. Fails with `DuplicateKey` if `_id` already exists.
    async fn insert(&self, ctx: &Context, collection: &str, doc: Document) -> StoreResult<()>;

    /// Replace the document stored under `id`.
    async fn replace_by_id(
        &self,
        ctx: &Context,
        collection: &str,
        id: &str,
        doc: Document,
    ) -> StoreResult<UpdateOutcome>;

    /// Delete the document stored under `id`.
    async fn delete_by_id(
        &self,
        ctx: &Context,
        collection: &str,
        id: &str,
    ) -> StoreResult<DeleteOutcome>;

    /// Fetch the document stored under `id`.
    async fn find_by_id(
        &self,
        ctx: &Context,
        collection: &str,
        id: &str,
    ) -> StoreResult<Option<Document>>;

    /// Fetch all documents matching `filter`.
    async fn find(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Filter,
    ) -> StoreResult<Vec<Document>>;

    /// Count documents matching `filter`.
    async fn count(&self, ctx: &Context, collection: &str, filter: &Filter) -> StoreResult<u64>;

    /// Delete all documents matching `filter`.
    async fn delete_many(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Filter,
    ) -> StoreResult<DeleteOutcome>;

    /// Open a new session.
    async fn start_session(&self) -> StoreResult<SessionHandle>;
}

/// A store session able to host one transaction at a time.
#[async_trait]
pub trait StoreSession: Send + Sync {
    fn id(&self) -> SessionId;

    fn transaction_state(&self) -> TransactionState;

    async fn start_transaction(&self) -> StoreResult<()>;

    async fn commit_transaction(&self, ctx: &Context) -> StoreResult<()>;

    async fn abort_transaction(&self, ctx: &Context) -> StoreResult<()>;

    /// End the session. A transaction still in progress is discarded.
    async fn end_session(&self);
}

impl fmt::Debug for dyn StoreSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSession")
            .field("id", &self.id())
            .field("transaction_state", &self.transaction_state())
            .finish()
    }
}
