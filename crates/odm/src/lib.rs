//! # elif-odm: Document Mapping Layer for elif.rs
//!
//! Maps typed models to documents in a document store, manages their identity
//! and timestamp fields, runs lifecycle hooks around every mutation and runs
//! units of work inside store transactions.
//!
//! The storage engine is reached only through the `DocumentStore` and
//! `StoreSession` traits; `InMemoryStore` is the bundled implementation.

pub mod backends;
pub mod collection;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod event_error;
pub mod events;
pub mod filter;
pub mod model;
pub mod observers;
pub mod transaction;



// Re-export core traits and types
pub use backends::{
    DeleteOutcome, Document, DocumentStore, InMemoryStore, SessionHandle, SessionId, StoreError,
    StoreOperation, StoreSession, UpdateOutcome, ID_FIELD,
};
pub use collection::Collection;
pub use config::{ConfigError, OdmConfig};
pub use connection::{Connection, ConnectionManager};
pub use context::Context;
pub use error::{ModelError, ModelResult, Phase};
pub use event_error::HookError;
pub use events::{HookPhase, ModelHooks, MutationOutcome};
pub use filter::{Filter, FilterCondition, FilterOperator};
pub use model::*;
pub use observers::{ModelObserver, ObserverManager, ObserverRegistry};
pub use transaction::{Transaction, TransactionRunner, TransactionState};

pub use async_trait::async_trait;
